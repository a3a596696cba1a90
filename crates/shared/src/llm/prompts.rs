pub const COMPANY_NAME: &str = "UniSole";
pub const CANONICAL_URL: &str = "https://unisole-empower.vercel.app/";
pub const CANONICAL_DOMAIN: &str = "unisole-empower.vercel.app";

const SYSTEM_PROMPT_HEAD: &str = "You are UniSole, a friendly and intelligent conversational AI assistant created by UniSole startup company.

You represent the UniSole brand, which is a real company focused on empowering individuals and businesses
through AI solutions and digital transformation.

Here is information about UniSole that you should use to answer questions:
";

const SYSTEM_PROMPT_TAIL: &str = "

Be helpful, concise, and conversational. Your responses should be brief and to the point.
If someone asks about people, technologies, or topics you don't know about, it's okay to say you don't have specific information.
However, as UniSole's representative, always be professional and positive.
Always mention the website https://unisole-empower.vercel.app/ when discussing UniSole's products or services.
";

/// Fixed assistant instructions with the reference document spliced in.
pub fn system_prompt(reference_text: &str) -> String {
    let mut prompt = String::with_capacity(
        SYSTEM_PROMPT_HEAD.len() + reference_text.len() + SYSTEM_PROMPT_TAIL.len(),
    );
    prompt.push_str(SYSTEM_PROMPT_HEAD);
    prompt.push_str(reference_text);
    prompt.push_str(SYSTEM_PROMPT_TAIL);
    prompt
}

#[cfg(test)]
mod tests {
    use super::{CANONICAL_URL, system_prompt};

    #[test]
    fn system_prompt_embeds_reference_and_canonical_url() {
        let prompt = system_prompt("UniSole builds assistants for small teams.");

        assert!(prompt.starts_with("You are UniSole"));
        assert!(prompt.contains(
            "use to answer questions:\nUniSole builds assistants for small teams.\n\nBe helpful"
        ));
        assert!(prompt.contains(CANONICAL_URL));
    }
}
