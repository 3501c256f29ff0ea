/// Combines keywords and a free-form prompt into one query.
///
/// Returns `None` when both are blank.
pub fn compose_query(keywords: Option<&str>, prompt: Option<&str>) -> Option<String> {
    let keywords = keywords.map(str::trim).filter(|k| !k.is_empty());
    let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());

    let mut query = String::new();
    if let Some(keywords) = keywords {
        query.push_str(&format!("Keywords: {keywords}\n"));
    }
    if let Some(prompt) = prompt {
        query.push_str(&format!("Instructions: {prompt}"));
    }
    (!query.is_empty()).then_some(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_and_prompt_are_combined() {
        assert_eq!(
            compose_query(Some(" rust, sse "), Some("summarize")).as_deref(),
            Some("Keywords: rust, sse\nInstructions: summarize")
        );
    }

    #[test]
    fn either_part_alone_is_enough() {
        assert_eq!(
            compose_query(Some("tokio"), None).as_deref(),
            Some("Keywords: tokio\n")
        );
        assert_eq!(
            compose_query(None, Some("hello")).as_deref(),
            Some("Instructions: hello")
        );
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert_eq!(compose_query(Some("  "), Some("")), None);
        assert_eq!(compose_query(None, None), None);
    }
}
