use tracing::warn;

/// Generative model seam: one prompt in, prose out.
pub trait AnswerComposer: Send + Sync {
    fn ask(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Formats the merged retrieval context and the raw question into one prompt.
pub fn build_prompt(contexts: &[String], question: &str) -> String {
    let mut prompt = String::from(
        "You are a medical knowledge assistant. Answer the question using the context below. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );
    if contexts.is_empty() {
        prompt.push_str("(no context retrieved)\n");
    }
    for (i, ctx) in contexts.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, ctx));
    }
    prompt.push_str(&format!("\nQuestion: {question}\nAnswer:"));
    prompt
}

/// Calls the composer; a failure comes back as a textual error message.
pub fn compose_answer(composer: &dyn AnswerComposer, prompt: &str) -> String {
    match composer.ask(prompt) {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "answer generation failed");
            format!("Error generating response: {e:#}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl AnswerComposer for Echo {
        fn ask(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(prompt.len().to_string())
        }
    }

    struct Broken;
    impl AnswerComposer for Broken {
        fn ask(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    #[test]
    fn prompt_lists_contexts_in_order_then_question() {
        let prompt = build_prompt(&["first".to_string(), "second".to_string()], "why?");
        let first = prompt.find("[1] first").unwrap();
        let second = prompt.find("[2] second").unwrap();
        let question = prompt.find("Question: why?").unwrap();
        assert!(first < second && second < question);
    }

    #[test]
    fn empty_context_is_marked() {
        assert!(build_prompt(&[], "q").contains("(no context retrieved)"));
    }

    #[test]
    fn failures_become_text() {
        assert_eq!(compose_answer(&Echo, "abc"), "3");
        assert_eq!(compose_answer(&Broken, "abc"), "Error generating response: quota exceeded");
    }
}
