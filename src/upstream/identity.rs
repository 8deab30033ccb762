use std::borrow::Cow;
use std::sync::LazyLock;

use regex_lite::{NoExpand, Regex};

static IDENTITY_QUESTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)who (are|created|made|built|trained)|creator|origin|identity|who am i|what are you|what model|tell me.*about you|more about|elaborate|describe yourself|introduce yourself|darkai",
    )
    .ok()
});

/// Ordered `(pattern, case_insensitive, replacement)` rules; longer phrases
/// must run before their substrings. Only the bare name is matched exactly.
const REWRITE_RULES: [(&str, bool, &str); 7] = [
    (
        "I was trained and developed by DarkAI",
        true,
        "I am Kiwi AI Dark Code 76, created by Kiwi AI (KiwiAI.com)",
    ),
    (
        "trained and developed by DarkAI",
        true,
        "created by Kiwi AI (KiwiAI.com)",
    ),
    ("I was trained by DarkAI", true, "I was created by Kiwi AI"),
    ("trained by DarkAI", true, "created by Kiwi AI"),
    ("DarkAI", false, "Kiwi AI"),
    (
        "I was trained",
        true,
        "I am Kiwi AI Dark Code 76, created by Kiwi AI",
    ),
    ("trained by", true, "created by"),
];

static REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    REWRITE_RULES
        .into_iter()
        .filter_map(|(pattern, case_insensitive, replacement)| {
            let pattern = if case_insensitive {
                format!("(?i){pattern}")
            } else {
                pattern.to_string()
            };
            Regex::new(&pattern).ok().map(|regex| (regex, replacement))
        })
        .collect()
});

#[must_use]
pub fn is_identity_question(text: &str) -> bool {
    IDENTITY_QUESTION
        .as_ref()
        .is_some_and(|regex| regex.is_match(text))
}

/// Prefix identity questions with the assistant's self-description.
#[must_use]
pub fn wrap_identity_prompt(text: &str) -> Cow<'_, str> {
    if !is_identity_question(text) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(format!(
        "Context: You are Kiwi AI Dark Code 76, created by Kiwi AI (KiwiAI.com), not DarkAI. \
         You are a specialized coding assistant optimized for code generation, debugging, \
         and technical analysis. You run on a very fast and powerful 12B parameter server \
         deployed on KiwiAI.com.\n\n\
         Now answer this question naturally and conversationally: {text}\n\n\
         Remember to clarify your actual identity and creator in your response."
    ))
}

/// Replace upstream self-attribution in a response.
#[must_use]
pub fn rewrite_identity(text: &str) -> String {
    let mut out = text.to_string();
    for (regex, replacement) in REWRITES.iter() {
        let rewritten = match regex.replace_all(&out, NoExpand(*replacement)) {
            Cow::Borrowed(_) => continue,
            Cow::Owned(rewritten) => rewritten,
        };
        out = rewritten;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_question_detection() {
        assert!(is_identity_question("Who created you?"));
        assert!(is_identity_question("please INTRODUCE YOURSELF"));
        assert!(is_identity_question("tell me something about you"));
        assert!(!is_identity_question("write a quicksort in rust"));
    }

    #[test]
    fn test_wrap_only_identity_questions() {
        assert!(matches!(wrap_identity_prompt("sort a list"), Cow::Borrowed(_)));
        let wrapped = wrap_identity_prompt("who are you");
        assert!(wrapped.starts_with(
            "Context: You are Kiwi AI Dark Code 76, created by Kiwi AI (KiwiAI.com), not DarkAI. "
        ));
        assert!(wrapped.contains("12B parameter server deployed on KiwiAI.com.\n\n"));
        assert!(wrapped.contains("naturally and conversationally: who are you\n\n"));
        assert!(wrapped
            .ends_with("Remember to clarify your actual identity and creator in your response."));
    }

    #[test]
    fn test_rewrite_full_sentence_first() {
        assert_eq!(
            rewrite_identity("I was trained and developed by DarkAI."),
            "I am Kiwi AI Dark Code 76, created by Kiwi AI (KiwiAI.com)."
        );
    }

    #[test]
    fn test_rewrite_short_forms() {
        assert_eq!(
            rewrite_identity("This model was trained by DarkAI"),
            "This model was created by Kiwi AI"
        );
        assert_eq!(rewrite_identity("DarkAI rocks"), "Kiwi AI rocks");
        assert_eq!(
            rewrite_identity("it was trained by experts"),
            "it was created by experts"
        );
    }

    #[test]
    fn test_rewrite_phrases_ignore_case() {
        assert_eq!(
            rewrite_identity("i was trained by darkai. Trained By DarkAI."),
            "I was created by Kiwi AI. created by Kiwi AI."
        );
        assert_eq!(
            rewrite_identity("TRAINED AND DEVELOPED BY DARKAI"),
            "created by Kiwi AI (KiwiAI.com)"
        );
    }

    #[test]
    fn test_bare_name_is_case_sensitive() {
        assert_eq!(rewrite_identity("darkai"), "darkai");
        assert_eq!(rewrite_identity("ask DarkAI"), "ask Kiwi AI");
    }
}
