use crate::host::{HostError, MapHost};

pub fn placeholder(key: &str) -> String {
    format!("@@@{}@@@", key)
}

/// Replace every `@@@key@@@` in `text`. `None` when nothing matched.
pub fn substitute_text(text: &str, key: &str, value: &str) -> Option<String> {
    let finder = placeholder(key);
    text.contains(&finder).then(|| text.replace(&finder, value))
}

pub fn layout_mentions(host: &dyn MapHost, layout: &str, key: &str) -> bool {
    let finder = placeholder(key);
    host.text_elements(layout)
        .iter()
        .any(|element| element.text.contains(&finder))
}

/// Substitute `key` across every text element of `layout`; returns how many elements changed.
pub fn substitute_layout(host: &mut dyn MapHost, layout: &str, key: &str, value: &str) -> Result<usize, HostError> {
    let mut changed = 0;
    for element in host.text_elements(layout) {
        if let Some(text) = substitute_text(&element.text, key, value) {
            host.set_text(layout, &element.name, &text)?;
            changed += 1;
        }
    }
    Ok(changed)
}
