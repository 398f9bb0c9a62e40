//! TwiML replies for the inbound webhook.

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A `<Response>` carrying one `<Message>` per part, in order.
#[must_use]
pub fn messaging_response<S: AsRef<str>>(messages: &[S]) -> String {
    let mut out = String::from(XML_DECLARATION);
    if messages.is_empty() {
        out.push_str("<Response />");
        return out;
    }
    out.push_str("<Response>");
    for message in messages {
        out.push_str("<Message>");
        escape_into(message.as_ref(), &mut out);
        out.push_str("</Message>");
    }
    out.push_str("</Response>");
    out
}

/// Acknowledges the webhook without replying inline.
#[must_use]
pub fn empty_response() -> String {
    messaging_response::<&str>(&[])
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}
