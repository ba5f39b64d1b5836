//! Classification of raw model replies into sections.
//!
//! A well-behaved reply looks like:
//!
//! ```text
//! <response>
//!   <think>...</think>
//!   <action>call:ns.fn(1)</action>
//!   <final-answer>...</final-answer>
//! </response>
//! ```
//!
//! When the root tag is present, the reply is parsed as XML and any parse
//! error discards the whole reply. Otherwise each section is picked out of
//! the raw text on its own.

use quick_xml::Reader;
use quick_xml::events::Event;

const ROOT_OPEN: &str = "<response>";
const ROOT_CLOSE: &str = "</response>";

const THINK: &str = "think";
const ACTION: &str = "action";
const FINAL_ANSWER: &str = "final-answer";

/// Sections of one model reply. Each section is trimmed, and absent when
/// empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResponseSections {
    /// The model's reasoning.
    pub think: Option<String>,
    /// The action block with `call:` directives.
    pub action: Option<String>,
    /// The final answer of the turn.
    pub final_answer: Option<String>,
}

impl ResponseSections {
    /// Returns `true` if no section is present, meaning the reply is
    /// malformed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.think.is_none()
            && self.action.is_none()
            && self.final_answer.is_none()
    }

    fn from_raw(think: &str, action: &str, final_answer: &str) -> Self {
        Self {
            think: non_empty(think),
            action: non_empty(action),
            final_answer: non_empty(final_answer),
        }
    }
}

#[inline]
fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Splits a raw reply into its sections.
pub fn extract(reply: &str) -> ResponseSections {
    if reply.contains(ROOT_OPEN) {
        extract_structured(reply)
    } else {
        extract_fallback(reply)
    }
}

/// Parses the first `<response>` element as XML, ignoring anything around
/// it.
pub(crate) fn extract_structured(reply: &str) -> ResponseSections {
    let mut xml = reply;
    if let Some(start) = xml.find(ROOT_OPEN) {
        xml = &xml[start..];
    }
    if let Some(end) = xml.find(ROOT_CLOSE) {
        xml = &xml[..end + ROOT_CLOSE.len()];
    }

    match parse_root(xml) {
        Ok([think, action, final_answer]) => {
            ResponseSections::from_raw(&think, &action, &final_answer)
        }
        Err(err) => {
            debug!("failed to parse the reply as XML: {err}");
            ResponseSections::default()
        }
    }
}

/// Picks each section out of the raw text independently.
pub(crate) fn extract_fallback(reply: &str) -> ResponseSections {
    ResponseSections::from_raw(
        extract_tag(reply, THINK),
        extract_tag(reply, ACTION),
        extract_tag(reply, FINAL_ANSWER),
    )
}

/// Returns the text between the first `<tag>` and the first `</tag>`.
fn extract_tag<'a>(content: &'a str, tag: &str) -> &'a str {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let (Some(start), Some(end)) = (content.find(&open), content.find(&close))
    else {
        return "";
    };
    content.get(start + open.len()..end).unwrap_or("")
}

/// Collects the direct text of the three known children of the root.
///
/// Text nested deeper than a child is skipped, unknown children are
/// ignored, and a repeated child replaces the earlier one.
fn parse_root(xml: &str) -> Result<[String; 3], String> {
    let mut reader = Reader::from_str(xml);
    let mut sections: [String; 3] = Default::default();
    let mut current: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|err| err.to_string())?;
        match event {
            Event::Start(start) => {
                depth += 1;
                if depth == 2 {
                    current = section_index(start.name().as_ref());
                    if let Some(idx) = current {
                        sections[idx].clear();
                    }
                }
            }
            Event::Empty(empty) => {
                if depth == 1 {
                    if let Some(idx) = section_index(empty.name().as_ref()) {
                        sections[idx].clear();
                    }
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(sections);
                }
            }
            Event::Text(text) => {
                if let (2, Some(idx)) = (depth, current) {
                    let text = text.unescape().map_err(|err| err.to_string())?;
                    sections[idx].push_str(&text);
                }
            }
            Event::CData(data) => {
                if let (2, Some(idx)) = (depth, current) {
                    sections[idx].push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => {
                return Err("unexpected end of input".to_owned());
            }
            _ => {}
        }
    }
}

#[inline]
fn section_index(name: &[u8]) -> Option<usize> {
    match name {
        b"think" => Some(0),
        b"action" => Some(1),
        b"final-answer" => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_reply() {
        let reply = "<response>\n\
            <think> I should look it up. </think>\n\
            <action>\ncall:web.search(\"rust\")\n</action>\n\
            </response>";
        let sections = extract(reply);
        assert_eq!(sections.think.as_deref(), Some("I should look it up."));
        assert_eq!(
            sections.action.as_deref(),
            Some("call:web.search(\"rust\")")
        );
        assert_eq!(sections.final_answer, None);
        assert!(!sections.is_empty());
    }

    #[test]
    fn test_structured_and_fallback_agree() {
        let reply = "Sure! Here you go:\n\
            <response>\
            <think>easy</think>\
            <action>call:math.add(1, 2)</action>\
            <final-answer>3</final-answer>\
            </response>\n\
            Let me know if you need anything else.";
        let structured = extract_structured(reply);
        let fallback = extract_fallback(reply);
        assert_eq!(structured, fallback);
        assert_eq!(structured.final_answer.as_deref(), Some("3"));
        assert_eq!(extract(reply), structured);
    }

    #[test]
    fn test_structured_parse_error_discards_everything() {
        // Unbalanced `<b>` makes the whole reply invalid.
        let reply = "<response><think><b>bold</think>\
            <final-answer>42</final-answer></response>";
        assert!(extract(reply).is_empty());

        // Missing the closing root tag.
        let reply = "<response><final-answer>42</final-answer>";
        assert!(extract(reply).is_empty());

        // Bare ampersand.
        let reply = "<response><final-answer>a & b</final-answer></response>";
        assert!(extract(reply).is_empty());
    }

    #[test]
    fn test_structured_entities_and_unknown_children() {
        let reply = "<response>\
            <mood>happy</mood>\
            <final-answer>1 &lt; 2 <![CDATA[& more]]></final-answer>\
            <think/>\
            </response>";
        let sections = extract(reply);
        assert_eq!(sections.final_answer.as_deref(), Some("1 < 2 & more"));
        assert_eq!(sections.think, None);
    }

    #[test]
    fn test_structured_skips_nested_text() {
        let reply = "<response><think>outer <i>inner</i> tail</think>\
            </response>";
        let sections = extract(reply);
        assert_eq!(sections.think.as_deref(), Some("outer  tail"));
    }

    #[test]
    fn test_fallback_reply() {
        let reply = "<think>hmm</think> stray <final-answer> done </final-answer>\
            <final-answer>ignored</final-answer>";
        let sections = extract(reply);
        assert_eq!(sections.think.as_deref(), Some("hmm"));
        assert_eq!(sections.action, None);
        assert_eq!(sections.final_answer.as_deref(), Some("done"));
    }

    #[test]
    fn test_fallback_tolerates_broken_markup() {
        let reply = "<action>call:a.b(1)</action> <think>unclosed";
        let sections = extract(reply);
        assert_eq!(sections.action.as_deref(), Some("call:a.b(1)"));
        assert_eq!(sections.think, None);

        let reply = "</think>backwards<think>";
        assert!(extract(reply).is_empty());
    }

    #[test]
    fn test_no_tags() {
        assert!(extract("I am just chatting.").is_empty());
        assert!(extract("<think>   </think>").is_empty());
    }
}
