//! Machine translation seam used by post-processing.

use async_trait::async_trait;

/// A text translator. Failures are reported as `None`; callers keep the
/// original text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Option<String>;

    /// Translate several strings in one request.
    ///
    /// The strings are joined with newlines and split again afterwards, so
    /// the result is rejected unless the line count matches the input.
    async fn translate_many(&self, texts: &[String]) -> Option<Vec<String>> {
        if texts.is_empty() {
            return Some(Vec::new());
        }
        if texts.iter().any(|t| t.contains('\n')) {
            return None;
        }

        let translated = self.translate(&texts.join("\n")).await?;
        let lines: Vec<String> = translated.lines().map(|l| l.trim().to_string()).collect();
        (lines.len() == texts.len()).then_some(lines)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::UpperTranslator;
    use super::*;

    struct LineEater;

    #[async_trait]
    impl Translator for LineEater {
        async fn translate(&self, text: &str) -> Option<String> {
            Some(text.replace('\n', " "))
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_translate_many_splits_lines() {
        let out = UpperTranslator
            .translate_many(&strings(&["drama", "comedy"]))
            .await
            .unwrap();
        assert_eq!(out, strings(&["DRAMA", "COMEDY"]));
    }

    #[tokio::test]
    async fn test_translate_many_rejects_count_mismatch() {
        assert!(LineEater
            .translate_many(&strings(&["a", "b"]))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_translate_many_edge_cases() {
        assert_eq!(UpperTranslator.translate_many(&[]).await, Some(Vec::new()));
        assert!(UpperTranslator
            .translate_many(&strings(&["two\nlines"]))
            .await
            .is_none());
        assert!(UpperTranslator
            .translate_many(&strings(&["fail"]))
            .await
            .is_none());
    }
}
