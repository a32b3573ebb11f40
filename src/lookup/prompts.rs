// Prompts sent to the completion model

/// Ask for the parent company. The model is told to echo the company's own
/// name when there is no parent, which the resolver maps to the sentinel.
pub fn parent_prompt(company_name: &str) -> String {
    format!(
        "What is the parent company of {company}? Respond with only the name of the parent company. \
         If it is the parent company itself or has no parent, respond with '{company}'.",
        company = company_name
    )
}

/// Describe a standalone company
pub fn standalone_description_prompt(company_name: &str) -> String {
    format!(
        "Provide a brief 2-3 sentence description of {}, including what industry it operates in and what it's known for.",
        company_name
    )
}

/// Describe how the parent relates to the company
pub fn relationship_description_prompt(parent_company: &str, company_name: &str) -> String {
    format!(
        "Provide a brief 2-3 sentence description of how {} relates to {}, including when the acquisition happened if applicable.",
        parent_company, company_name
    )
}
