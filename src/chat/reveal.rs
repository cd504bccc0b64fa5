//! Progressive reveal of assistant replies

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Feeds `text` to `on_char` one character at a time with `delay` before
/// each character.
///
/// Stops at the next character boundary once `cancel` fires. Returns `true`
/// if the whole text was delivered.
pub async fn reveal<F>(text: &str, delay: Duration, cancel: &CancellationToken, mut on_char: F) -> bool
where
    F: FnMut(char),
{
    for ch in text.chars() {
        if cancel.is_cancelled() {
            return false;
        }
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        on_char(ch);
    }
    true
}
