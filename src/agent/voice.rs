//! 语音安全文本
//!
//! 去除 Markdown 标记、链接与 URL、HTML 标签、强调符号、列表符号与 emoji，得到可直接朗读的纯文本。
//! 反复应用单次清洗直到不再变化，因此 voice_safe(voice_safe(x)) == voice_safe(x)。
//! 每条规则只删除字符或把单个字符换成空格，文本长度不增，循环必然收敛。

use std::sync::OnceLock;

use regex::Regex;

/// 单次清洗规则：(模式, 替换)；按顺序应用
const RULES: &[(&str, &str)] = &[
    // 图片与链接保留可读文本；只匹配最内层，嵌套链接逐层展开
    (r"!\[([^\[\]]*)\]\([^)]*\)", "$1"),
    (r"\[([^\[\]]*)\]\([^)]*\)", "$1"),
    (r"<https?://[^>]*>", ""),
    (r"https?://\S+", ""),
    (r"www\.\S+", ""),
    (r"<[^>\n]+>", ""),
    // 代码块围栏、标题、引用
    (r"(?m)^[ \t]*```.*$", ""),
    (r"(?m)^[ \t]{0,3}#{1,6}[ \t]*", ""),
    (r"(?m)^[ \t]*>+[ \t]?", ""),
    // 分隔线
    (r"(?m)^[ \t]*([-=_*][ \t]*){3,}$", ""),
    // 列表符号
    (r"(?m)^[ \t]*[-+•▪◦‣●○■□➤►][ \t]+", ""),
    // 强调与行内代码
    (r"[*`~]+", ""),
    (r"(^|\s)_+", "$1"),
    (r"_+(\s|$)", "$1"),
    (r"__+", ""),
    (r"\|", " "),
    // emoji、变体选择符、零宽连接符
    (
        r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{1F1E6}-\x{1F1FF}\x{FE0E}\x{FE0F}\x{200D}\x{20E3}]",
        "",
    ),
    // 空白规整
    (r"[ \t\x{00A0}]+", " "),
    (r"(?m)^ +| +$", ""),
    (r"\n{3,}", "\n\n"),
];

fn rules() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, rep)| match Regex::new(pattern) {
                Ok(re) => Some((re, *rep)),
                Err(e) => {
                    tracing::error!(pattern = %pattern, "invalid voice rule: {}", e);
                    None
                }
            })
            .collect()
    })
}

fn strip_pass(text: &str) -> String {
    let mut out = text.replace("\r\n", "\n");
    for (re, rep) in rules() {
        out = re.replace_all(&out, *rep).into_owned();
    }
    out.trim().to_string()
}

/// 生成可朗读的文本
pub fn voice_safe(text: &str) -> String {
    let mut current = strip_pass(text);
    loop {
        let next = strip_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
