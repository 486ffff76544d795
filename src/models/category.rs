/// 医学影像学分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Category {
    /// X线
    XRay,
    /// CT
    Ct,
    /// MRI
    Mri,
    /// 超声
    Ultrasound,
    /// 核医学
    NuclearMedicine,
}

impl Category {
    /// 全部目标分类（按报告输出顺序）
    pub const ALL: [Category; 5] = [
        Category::XRay,
        Category::Ct,
        Category::Mri,
        Category::Ultrasound,
        Category::NuclearMedicine,
    ];

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Category::XRay => "X线",
            Category::Ct => "CT",
            Category::Mri => "MRI",
            Category::Ultrasound => "超声",
            Category::NuclearMedicine => "核医学",
        }
    }

    /// 从模型返回的标签解析分类，非目标方向返回 None
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(label))
    }

    /// 分类结果文件名
    pub fn file_name(self) -> String {
        format!("{}_questions.json", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("CT"), Some(Category::Ct));
        assert_eq!(Category::from_label(" mri "), Some(Category::Mri));
        assert_eq!(Category::from_label("核医学"), Some(Category::NuclearMedicine));
        assert_eq!(Category::from_label("不相关"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_name_round_trip_for_all() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.name()), Some(category));
        }
        assert_eq!(Category::XRay.file_name(), "X线_questions.json");
    }
}
