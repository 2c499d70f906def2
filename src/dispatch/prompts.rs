//! Prompt templates sent upstream

use super::mode::AnalysisMode;
use serde::{Deserialize, Serialize};

const DOCUMENT_INTRO: &str =
    "你是一个专业的宠物活动文档解析专家。你的任务是分析用户提供的文档内容，识别其中的多个独立宠物活动事件，并将每个事件转换为结构化的时间轴记录。";

const HISTORY_TEXT_INTRO: &str =
    "你是一个专业的宠物活动记录解析专家。你的任务是分析用户提供的文档内容，识别其中的多个独立宠物活动事件，并将每个事件转换为结构化的时间轴记录。";

const PARSING_RULES: &str = r#"

## 核心功能：
1. **多活动识别**：从文档中识别所有与宠物相关的活动、行为、健康状况等事件
2. **智能拆分**：将复合的宠物活动拆分为多个独立的时间轴记录
3. **时间推理**：对于缺失时间的事件，根据上下文推断合理时间
4. **内容完整性**：确保每个活动都有完整的描述和上下文信息

## 解析规则：
### 时间信息处理：
- 精确识别绝对时间（如：2024年1月15日 14:30、上午8点、下午3:30）
- 识别相对时间（如：昨天、上周、三天前、刚才）
- 识别时间范围（如：2024年1月-3月、这个月、最近一周）
- 对于缺失时间的事件，根据文档顺序和上下文推断合理时间

### 宠物活动分类：
- **feeding**：喂食、进食、饮水、零食、营养补充
- **exercise**：运动、散步、跑步、玩耍、游戏、追逐
- **grooming**：梳理毛发、洗澡、清洁、美容、修剪指甲
- **training**：训练、学习、行为纠正、技能练习
- **rest**：睡觉、休息、打盹、放松
- **health**：体检、医疗、用药、健康监测、疫苗
- **social**：社交、与其他宠物互动、与人互动
- **elimination**：如厕、排便、排尿
- **abnormal**：异常行为、问题行为、健康异常
- **other**：其他活动

### 事件独立性判断：
- 每个具有独立意义的宠物行为、活动、健康状况都应作为单独事件
- 同一时间的不同宠物活动可以拆分为多个事件
- 因果关系明确的宠物活动应保持独立
- 连续性活动可以根据时间段拆分

### 内容完整性要求：
- 每个宠物活动必须包含足够的上下文信息
- 保留关键的宠物行为细节和数据
- 确保活动描述的自包含性
- 提取相关的环境、情绪、健康状态信息

## 输出格式要求：
请严格按照以下JSON格式输出，不要包含任何其他文字：

```json
{
  "events": [
    {
      "timestamp": "2024-01-15T14:30:00",
      "title": "事件标题（简洁明确，突出活动类型）",
      "content": "事件详细内容描述（包含行为细节、环境信息、持续时间等）",
      "category": "事件类别（使用上述分类）",
      "confidence": 0.95,
      "metadata": {
        "source": "document",
        "original_text": "原始文档中的相关文字",
        "context": "相关上下文信息",
        "duration": "活动持续时间（如果有）",
        "location": "活动地点（如果有）",
        "participants": "参与者（如果有）"
      },
      "tags": ["宠物类型", "活动特征", "环境标签", "行为标签"]
    }
  ],
  "summary": {
    "total_events": 事件总数,
    "time_range": {
      "start": "最早时间",
      "end": "最晚时间"
    },
    "categories": ["涉及的类别列表"],
    "confidence_avg": 平均置信度,
    "parsing_notes": "解析过程中的重要说明"
  }
}
```

## 质量要求：
- 时间信息准确性：确保时间解析正确，时区处理合理
- 事件完整性：每个事件都有完整的标题、内容、类别
- 逻辑一致性：事件之间的时间顺序合理
- 置信度评估：根据时间信息的明确程度和内容完整性评估置信度

请开始解析用户提供的文档内容，识别并拆分其中的多个宠物活动事件。"#;

/// Per-mode prompts plus the system prompts of the document endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub normal: String,
    pub pet: String,
    pub health: String,
    pub travel: String,
    pub history: String,
    pub document_system: String,
    pub history_text_system: String,
    /// Prepended to the user text of both document endpoints
    pub document_user_prefix: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            normal: "当前为普通模式，专注于提供日常通用问题的专业解答和实用建议。服务范围包括生活常识、实用技巧、基础咨询等领域，确保提供准确、可靠的信息支持。请分析这张图片的内容，描述主要物体和场景。".to_string(),
            pet: "当前为宠物模式，请执行以下专业分析：1. 精确识别宠物品种、显著特征及当前行为状态；2. 详细分析宠物活动类型（包括但不限于睡觉、玩耍、进食、观察等行为）；3. 科学评估宠物能量水平及行为模式特征；4. 提供针对性的行为解读和建议。".to_string(),
            health: "当前为健康模式，请基于用户上传的宠物体检报告或状态照片：1. 进行专业的健康状态评估；2. 识别潜在健康风险并提供预警；3. 生成详细的养护建议报告；4. 必要时推荐进一步检查方案。".to_string(),
            travel: "当前为出行箱模式，请提供全面的宠物出行专业指导：1. 出行前的准备工作清单；2. 运输途中的专业护理方案；3. 目的地适应期的注意事项；4. 突发情况的应急处理建议。请分析图片中的出行相关场景。".to_string(),
            history: "当前为历史记录分析模式，请基于用户提供的历史记录信息进行深度分析：1. 分析图片内容与用户描述的关联性和一致性；2. 提取关键信息并生成结构化的记录摘要；3. 识别潜在的行为模式、趋势或异常情况；4. 提供基于历史数据的洞察和建议；5. 生成适合长期追踪的标签和分类信息。".to_string(),
            document_system: format!("{}{}", DOCUMENT_INTRO, PARSING_RULES),
            history_text_system: format!("{}{}", HISTORY_TEXT_INTRO, PARSING_RULES),
            document_user_prefix: "请解析以下宠物活动文档内容：\n\n".to_string(),
        }
    }
}

impl PromptSet {
    pub fn for_mode(&self, mode: AnalysisMode) -> &str {
        match mode {
            AnalysisMode::Normal => &self.normal,
            AnalysisMode::Pet => &self.pet,
            AnalysisMode::Health => &self.health,
            AnalysisMode::Travel => &self.travel,
            AnalysisMode::History => &self.history,
        }
    }

    /// History prompt with the user's title and description filled in
    pub fn history_record(&self, title: &str, description: &str) -> String {
        let description = if description.is_empty() {
            "无"
        } else {
            description
        };
        format!(
            "{}\n\n用户提供的信息：\n标题：{}\n描述：{}\n\n请基于图片内容和用户提供的信息，生成一个结构化的分析结果，包括：\n1. 对图片内容的专业分析\n2. 与用户描述的关联性评估\n3. 提取的关键标签和分类\n4. 适合历史追踪的洞察建议\n",
            self.history, title, description
        )
    }

    pub fn document_user(&self, text: &str) -> String {
        format!("{}{}", self.document_user_prefix, text)
    }
}
