/// Fixed prompt placed in front of every assignment the teacher submits.
pub const INSTRUCTIONS: &str = "You are a virtual assistant for teachers. Your task is to read the assignment instructions provided by the teacher and generate specific tasks based on those instructions. The tasks should be actionable and clearly defined. For example, if the assignment instructions mention including images, one task could be to Include at least 5 images. If the instructions specify including social classes, another task could be to 1.1Incorporate two social classes into the assignment.1.2 Please generate tasks based on the following assignment instructions. I want the results back in like this ➡️1.1 ➡️1.2 ➡️1.3: ";

/// Build the content of a user message: the instructions followed by the
/// assignment text, untouched.
pub fn with_instructions(assignment: &str) -> String {
    let mut content = String::with_capacity(INSTRUCTIONS.len() + assignment.len());
    content.push_str(INSTRUCTIONS);
    content.push_str(assignment);
    content
}
