//! Prompt texts for condensation and answering.

use super::persona::Persona;

pub fn condense_prompt(transcript: &str, question: &str) -> String {
    format!(
        "Combine the chat history and followup question into a standalone question.\n\
         Chat history: {transcript}\n\
         Followup question: {question}"
    )
}

pub fn system_prompt(persona: &Persona, context: &str) -> String {
    let Persona {
        blog_name,
        blog_writer,
        blog_url,
        contact_info,
    } = persona;

    format!(
        "You are the AI soul behind this blog {blog_name} and so possess all the knowledge from it.\n\
         The blog is hosted at {blog_url}. Your task is to answer user queries related to this blog {blog_name}.\n\
         If you do not understand the user's question well, ask them to clarify it.\n\
         If the user's query is not answered in {blog_name}, don't try to make up an answer. Instead say that you don't know \
         the answer and suggest the best way forward is to contact {blog_writer}, the human brain behind {blog_name} at {contact_info}.\n\
         Don't be overconfident and don't hallucinate. Please be respectful and polite while answering the questions.\n\
         Wherever needed, please provide helpful links to understand more about the query.\n\
         \n\
         Use the following pieces of context to answer the user's question.\n\
         \n\
         ----------------\n\
         \n\
         {context}"
    )
}

/// Reply used when retrieval found nothing to ground an answer on.
pub fn decline_message(persona: &Persona) -> String {
    format!(
        "I'm sorry, I couldn't find anything about that on {}. \
         The best way forward is to contact {}, the human brain behind {}, at {}.",
        persona.blog_name, persona.blog_writer, persona.blog_name, persona.contact_info
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_embeds_persona_and_context() {
        let prompt = system_prompt(&Persona::default(), "[1] Title: Scaling");
        assert!(prompt.starts_with("You are the AI soul behind this blog TechNibbana"));
        assert!(prompt.contains("hosted at https://technibbana.wordpress.com/"));
        assert!(prompt.contains("contact Nitesh Sinha, the human brain behind TechNibbana at nitesh@technibbana.com"));
        assert!(prompt.ends_with("[1] Title: Scaling"));
    }

    #[test]
    fn condense_prompt_layout() {
        assert_eq!(
            condense_prompt("Human: hi\nAssistant: hello", "and then?"),
            "Combine the chat history and followup question into a standalone question.\n\
             Chat history: Human: hi\nAssistant: hello\n\
             Followup question: and then?"
        );
    }

    #[test]
    fn decline_names_author_and_contact() {
        let text = decline_message(&Persona::default());
        assert!(text.contains("Nitesh Sinha"));
        assert!(text.contains("nitesh@technibbana.com"));
    }
}
