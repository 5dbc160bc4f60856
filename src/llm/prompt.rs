

pub const SYSTEM_PROMPT: &str = "Be brief. \
Only return the most COMPLETE and accurate answer. \
Avoid explanations, introductions, and additional context. \
No need to introduce a summary at the end.";


pub fn build_classification_prompt(company_description: &str, context: &str) -> String {
    format!(
        r#"You are a NACE classification assistant.
Your job is to identify and return the exact NACE code.

Instructions:
- Analyze the company description.
- Use the context provided for reference.
- Respond with ONLY the NACE code (e.g., 'A01.1' or 'B05').
- Don't forget to include the letter

Company description:
{company_description}

Context:
{context}"#
    )
}


pub fn build_answer_prompt(question: &str, context: &str, history: &[String]) -> String {
    let history_block = if history.is_empty() {
        "(no previous conversation)".to_string()
    } else {
        history.join("\n")
    };

    format!(
        r#"Instructions:
- Follow the ESRS standards.
- Use the context provided for reference.
- No need to include summary tables
- Answer must be complete and accurate
- Give brief and concise answers
- Prioritize information quality over aesthetics
- Don't show tables, only plain text
- Don't say what was provided in context
- Give answer in markdown format
- Don't include numeric lists, only bullet points
Question: {question}
Context:
{context}
Take into account the previous conversation:
{history_block}"#
    )
}


pub fn build_title_prompt(company_description: &str) -> String {
    format!(
        r#"Generate a short title (max 6 words) for a conversation about ESRS reporting requirements based on this company description:
{company_description}
Just return the title without any quotation marks or additional text."#
    )
}
