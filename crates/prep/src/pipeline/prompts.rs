use super::meeting::{meetings_to_prompt_json, Meeting};

pub fn extraction_prompt(calendar_data: &str, operator_domain: &str) -> String {
    format!(
        r#"Extract meeting information from the following calendar data:

{calendar_data}

Important context:
- You work for the company that owns the {domain} email domain, so that company is your own, not the client company
- For each meeting, identify the client company name (the external company your company is meeting with)
- Only include attendees from the client company (exclude anyone with an @{domain} email)

For each meeting, extract:
1. The meeting title
2. The client company name
3. All client attendees with their emails and names
4. The meeting time in the format [Hour:Minute AM/PM]
5. Any additional information about the meeting attendees
Return the information in a structured json format."#,
        calendar_data = calendar_data,
        domain = operator_domain.trim_start_matches('@'),
    )
}

pub fn formatting_prompt(meetings: &[Meeting], research_results: &str) -> String {
    format!(
        r#"You are a meeting preparation assistant. You are given a list of calendar events and research results.
Your job is to prepare your colleagues for a day of meetings.
You must optimize for clarity and conciseness. Do not include any information that is not relevant to the meeting preparation.

Create a well-structured markdown document from the following meeting research results.

For each company, create a section with:
1. ## Company name @ Time of meeting
2. ### Meeting context (only if available)
- relevant background information about the company (only if available)
- relevant background information about the meeting (only if available)
3. ### Attendee subsections with their roles, background, and relevant information
4. Use proper markdown formatting including bold, italics, and bullet points where appropriate
5. Please include inline citations as Markdown hyperlinks directly in the response text.

Calendar Events: {events}
Research Results: {research}

Format the output as clean, well-structured markdown with clear sections and subsections."#,
        events = meetings_to_prompt_json(meetings),
        research = research_results,
    )
}
