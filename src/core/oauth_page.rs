pub enum CallbackPageVariant {
    Success,
    Error,
}

/// Render the page the browser lands on after the redirect.
pub fn render_callback_page(
    title: &str,
    heading: &str,
    detail: &str,
    variant: CallbackPageVariant,
) -> String {
    let accent = match variant {
        CallbackPageVariant::Success => "#4caf50",
        CallbackPageVariant::Error => "#d32f2f",
    };

    include_str!("../builtins/oauth-callback.html")
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{HEADING}}", &escape_html(heading))
        .replace("{{DETAIL}}", &escape_html(detail))
        .replace("{{ACCENT_COLOR}}", accent)
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
