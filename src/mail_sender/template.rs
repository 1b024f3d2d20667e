use crate::mail_sender::Recipient;

// Literal {column} substitution against one recipient row. A token naming a
// column the row does not have stays verbatim in the output.
pub fn render_template(template: &str, recipient: &Recipient) -> String {
    let mut rendered = template.to_string();

    for (field, value) in &recipient.fields {
        let placeholder = format!("{{{}}}", field);
        rendered = rendered.replace(&placeholder, value);
    }

    rendered
}
