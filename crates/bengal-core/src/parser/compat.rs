//! Legacy compatibility engine backed by pulldown-cmark.
//!
//! HTML-only: the unified HTML post-transform handles link rewriting for
//! output produced here. Directive fences are not expanded by this engine.

use pulldown_cmark::{html, Options, Parser as CmarkParser};

use crate::error::Result;

pub(super) fn parse_html(source: &str) -> Result<String> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let parser = CmarkParser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produces_html() {
        let html = parse_html("# Hi\n\n**bold**\n").unwrap();
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>"));
    }
}
