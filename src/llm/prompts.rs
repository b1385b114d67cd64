//! The NER instruction prompt sent to both models.
//!
//! The adapter was fine-tuned on exactly this wording, so it must stay
//! byte-for-byte stable; changing it changes what is being compared.

/// What a model answers when the text holds no entities.
pub const NO_ENTITIES_SENTINEL: &str = "没有找到任何实体和关系";

/// Stop sequences matching the prompt's trailing input section marker,
/// so a model that starts echoing a new example is cut off.
pub const STOP_SEQUENCES: &[&str] = &["\n\n输入文本：", "\n输入文本：", "输入文本："];

/// Prompt templates.
pub struct Prompts;

impl Prompts {
    /// Instruction block for entity extraction; `{text}` is replaced with the input.
    pub fn ner_extraction_template() -> &'static str {
        r#"你是一个文本实体抽取领域的专家，你需要从给定的句子中提取出实体并且以 json 格式输出, 如 {"entities": [{"name":"外层抗击区临界线","type":"军事装备"}]}

注意:
1. 输出的每一行都必须是正确的 json 字符串
2. 找不到任何实体时, 输出"没有找到任何实体和关系"
3. 如果地理实体有坐标需要输出地理实体的坐标，例如兰州(36.06,103.79)，没有坐标则输出地理实体
4. 实体类型必须从以下四种实体类型进行选择：军事装备，地理位置，组织名称，人名

输入文本：
{text}

请直接输出JSON结果："#
    }

    /// Build the extraction prompt for one input text.
    pub fn ner_extraction(text: &str) -> String {
        Self::ner_extraction_template().replace("{text}", text)
    }
}
