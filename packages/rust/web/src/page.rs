//! Server-rendered question page.

use html_escape::{encode_double_quoted_attribute, encode_text};

/// What to show under the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome<'a> {
    Answer(&'a str),
    Rejected(&'a str),
    Error(&'a str),
}

/// Render the page. Every user-visible string is HTML-escaped.
pub(crate) fn render(conversation: &str, question: Option<&str>, outcome: Option<Outcome<'_>>) -> String {
    let mut body = String::new();

    if let Some(question) = question {
        body.push_str(&format!(
            "<section class=\"question\"><h2>Your question</h2><p>{}</p></section>\n",
            encode_text(question)
        ));
    }

    match outcome {
        Some(Outcome::Answer(text)) => body.push_str(&format!(
            "<section class=\"answer\"><h2>Answer</h2><div>{}</div></section>\n",
            paragraphs(text)
        )),
        Some(Outcome::Rejected(message)) => body.push_str(&format!(
            "<section class=\"rejected\"><p>{}</p></section>\n",
            encode_text(message)
        )),
        Some(Outcome::Error(message)) => body.push_str(&format!(
            "<section class=\"error\"><p>{}</p></section>\n",
            encode_text(message)
        )),
        None => {}
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Milesdesk</title>
</head>
<body>
<h1>Milesdesk</h1>
<p>Ask about Flying Blue and Miles &amp; More status qualification.</p>
{body}<form method="post" action="/ask">
<input type="hidden" name="conversation" value="{conversation}">
<textarea name="question" rows="3" cols="60" required></textarea>
<button type="submit">Ask</button>
</form>
</body>
</html>
"#,
        conversation = encode_double_quoted_attribute(conversation),
    )
}

/// Blank-line separated blocks as escaped `<p>` elements.
fn paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", encode_text(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}
