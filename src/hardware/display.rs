//! Display sink backed by the process log, with the 16x2 character budget of
//! the little RGB LCD the controller normally drives.

use parking_lot::Mutex;
use tracing::info;

use super::DisplaySink;

pub const LCD_ROWS: usize = 2;
pub const LCD_COLS: usize = 16;

/// Formats reports to the LCD's row/column budget and logs them. The last
/// rendered text is retained so a frontend can re-read it.
#[derive(Default)]
pub struct LcdDisplay {
    last: Mutex<String>,
}

impl LcdDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_text(&self) -> String {
        self.last.lock().clone()
    }
}

impl DisplaySink for LcdDisplay {
    fn report(&self, text: &str) {
        let rendered = fit_to_screen(text);
        info!(target: "display", text = %rendered, "display updated");
        *self.last.lock() = rendered;
    }
}

/// Word-wrap into at most `LCD_ROWS` rows of `LCD_COLS` characters,
/// truncating the remainder.
fn fit_to_screen(text: &str) -> String {
    let mut rows: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if rows.len() == LCD_ROWS {
            break;
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if needed <= LCD_COLS {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            if rows.len() == LCD_ROWS {
                break;
            }
            // A single word longer than a row gets hard-clipped.
            let mut w = word.to_string();
            w.truncate(LCD_COLS);
            current = w;
        }
    }
    if !current.is_empty() && rows.len() < LCD_ROWS {
        rows.push(current);
    }
    rows.join("\n")
}
