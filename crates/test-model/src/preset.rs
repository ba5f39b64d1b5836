use serde::{Deserialize, Serialize};

/// A preset reply for one brain call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetReply {
    /// The brain answers with this assistant text.
    #[serde(rename = "text")]
    Text(String),
    /// The brain fails with this message.
    #[serde(rename = "failure")]
    Failure(String),
}

impl PresetReply {
    /// Creates a text reply.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text(text.into())
    }

    /// Creates a failing reply.
    #[inline]
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self::Failure(message.into())
    }
}

/// A reply wrapped in the root `<response>` tag with the given sections.
pub fn structured_reply(
    think: Option<&str>,
    action: Option<&str>,
    final_answer: Option<&str>,
) -> String {
    let mut reply = String::from("<response>\n");
    if let Some(think) = think {
        reply.push_str(&format!("<think>{think}</think>\n"));
    }
    if let Some(action) = action {
        reply.push_str(&format!("<action>\n{action}\n</action>\n"));
    }
    if let Some(final_answer) = final_answer {
        reply.push_str(&format!("<final-answer>{final_answer}</final-answer>\n"));
    }
    reply.push_str("</response>");
    reply
}
