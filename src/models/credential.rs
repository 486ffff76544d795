use std::fmt;

/// 日志 / 报告中显示的密钥前缀长度
pub const DISPLAY_KEY_CHARS: usize = 8;

/// 一个可用的访问密钥
///
/// `identifier` 原样放入请求头；`display_key` 只用于日志和报告，永远不是完整密钥。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identifier: String,
    display_key: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let display_key = identifier.chars().take(DISPLAY_KEY_CHARS).collect();
        Self {
            identifier,
            display_key,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_key(&self) -> &str {
        &self.display_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("display_key", &self.display_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_key_is_prefix() {
        let credential = Credential::new("sk-abcdefghijklmnop");
        assert_eq!(credential.display_key(), "sk-abcde");
        assert_eq!(credential.identifier(), "sk-abcdefghijklmnop");
    }

    #[test]
    fn test_debug_hides_secret() {
        let credential = Credential::new("sk-abcdefghijklmnop");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("sk-abcdefghijklmnop"));
        assert!(rendered.contains("sk-abcde"));
    }
}
