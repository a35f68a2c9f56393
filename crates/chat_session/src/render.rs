//! Markup seam for the rendering layer.

/// Turns accumulated message text into displayable markup. Must be pure.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// Passes text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl MarkupRenderer for PlainText {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }
}

impl<F> MarkupRenderer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn render(&self, text: &str) -> String {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_renderers() {
        let shout = |text: &str| text.to_uppercase();
        assert_eq!(shout.render("hi"), "HI");
        assert_eq!(PlainText.render("*hi*"), "*hi*");
    }
}
