//! Centralized prompt templates for the three triage stages.

use std::collections::HashMap;

/// System prompt for the moderation classifier.
pub const MODERATION_SYSTEM_PROMPT: &str = "\
You are a friendly content moderator for a tech-focused learning community with 300+ members.

Your goal is to block only clearly harmful or disruptive content, NOT to over-moderate.

Flag content ONLY if it clearly falls into one of these categories:
1. **Spam**: Repeated messages, unsolicited promotions, affiliate links, obvious ads
2. **Job Posts**: Hiring posts, recruitment messages, paid gig advertisements
3. **Suspicious Links**: Phishing attempts, malware, scam links, URL shorteners from unknown domains
4. **Harmful Content**: Abuse, harassment, hate speech, explicit or dangerous content

Be LENIENT with:
- ML / AI / Data Science discussions
- Web development, backend, frontend, DevOps, system design
- Career advice, internships, job search questions (NOT job postings)
- Project showcases, GitHub, arXiv, and blog links from trusted domains
- Casual tech chatter, beginner questions, general greetings
- Light off-topic discussion that feels normal in a learning community

When unsure, allow the message.";

/// System prompt for the routing analyst. `{mentor_domains}` is filled with
/// the live per-domain mentor counts.
const ROUTING_SYSTEM_TEMPLATE: &str = "\
You are a question triaging assistant for an ML/AI learning community.

Community members:
- **Beginners**: Learning ML basics
- **Mentors**: Industry professionals who volunteer to help

Mentor expertise domains:
{mentor_domains}

Your job: Analyze questions and decide:
1. **Complexity**: simple, moderate, complex
2. **Domain**: Which expertise domain(s) this belongs to
3. **Should tag mentors?**:
   - YES if: Complex/research questions, domain-specific, requires industry experience
   - NO if: Simple questions the community can answer

Respond in JSON:
{
    \"complexity\": \"simple\" | \"moderate\" | \"complex\",
    \"domains\": [\"domain1\", \"domain2\"],
    \"should_tag_mentors\": true/false,
    \"reason\": \"Brief explanation\",
    \"suggested_mentors\": [\"domain1\", \"domain2\"] or []
}";

/// Build the moderation user prompt around a message.
pub fn moderation_user_prompt(message_text: &str) -> String {
    format!(
        "Analyze the following message:\n\n{message_text}\n\n\
         Decide whether this message is appropriate for a tech learning community.\n\n\
         Respond ONLY in JSON:\n\
         {{\n\
             \"is_appropriate\": true/false,\n\
             \"category\": \"clean\" | \"spam\" | \"job_post\" | \"suspicious_link\" | \"harmful\",\n\
             \"confidence\": 0.0 to 1.0,\n\
             \"reason\": \"Short, clear explanation\"\n\
         }}"
    )
}

/// Build the routing (user, system) prompt pair.
///
/// The system prompt embeds the live domain → mentor-count mapping so the
/// model's decision is grounded in current availability.
pub fn routing_prompts(
    question: &str,
    mentor_domains: &HashMap<String, Vec<i64>>,
) -> (String, String) {
    let mut domains: Vec<_> = mentor_domains.iter().collect();
    domains.sort_by(|a, b| a.0.cmp(b.0));

    let domains_text = if domains.is_empty() {
        "- (no mentor domains configured)".to_string()
    } else {
        domains
            .iter()
            .map(|(domain, mentors)| format!("- {domain}: {} mentors", mentors.len()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let user = format!(
        "Analyze this question:\n\n{question}\n\nShould we tag mentors? If yes, which domains?"
    );
    let system = ROUTING_SYSTEM_TEMPLATE.replace("{mentor_domains}", &domains_text);
    (user, system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_prompt_embeds_message() {
        let prompt = moderation_user_prompt("check out my crypto course");
        assert!(prompt.contains("check out my crypto course"));
        assert!(prompt.contains("\"is_appropriate\""));
    }

    #[test]
    fn routing_prompt_embeds_mentor_counts() {
        let domains = HashMap::from([
            ("nlp".to_string(), vec![1, 2]),
            ("computer_vision".to_string(), vec![3]),
        ]);
        let (user, system) = routing_prompts("what is attention?", &domains);
        assert!(user.contains("what is attention?"));
        assert!(system.contains("- nlp: 2 mentors"));
        assert!(system.contains("- computer_vision: 1 mentors"));
    }

    #[test]
    fn routing_prompt_handles_empty_domains() {
        let (_, system) = routing_prompts("q", &HashMap::new());
        assert!(system.contains("no mentor domains configured"));
    }
}
