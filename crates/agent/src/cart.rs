//! Cart confirmation for recommended products.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use tracing::warn;

/// Replies that count as a yes.
pub const AFFIRMATIVES: &[&str] = &["yes", "y", "sure", "ok", "add it"];

/// Asks whether a recommended product should go into the basket.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, product: &str) -> bool;
}

pub fn is_affirmative(reply: &str) -> bool {
    let reply = reply.trim().to_lowercase();
    AFFIRMATIVES.contains(&reply.as_str())
}

/// The note appended to a final answer once a product is added.
pub fn basket_note(product: &str) -> String {
    format!("\n\n(System: '{product}' was added to the basket.)")
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, product: &str) -> bool {
        let question = format!("Add '{product}' to your basket? [yes/no]: ");
        let reply = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            write!(stdout, "{question}")?;
            stdout.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await;

        match reply {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read cart confirmation");
                false
            }
            Err(e) => {
                warn!(error = %e, "Cart confirmation task failed");
                false
            }
        }
    }
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _product: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_replies() {
        for reply in ["yes", "Y", "  Sure ", "OK\n", "add it", "Add It"] {
            assert!(is_affirmative(reply), "{reply:?}");
        }
        for reply in ["no", "", "yes please", "nope", "maybe"] {
            assert!(!is_affirmative(reply), "{reply:?}");
        }
    }

    #[test]
    fn note_names_the_product() {
        assert_eq!(
            basket_note("Green Shoe A"),
            "\n\n(System: 'Green Shoe A' was added to the basket.)"
        );
    }

    #[tokio::test]
    async fn auto_confirm_is_fixed() {
        assert!(AutoConfirm(true).confirm("x").await);
        assert!(!AutoConfirm(false).confirm("x").await);
    }
}
