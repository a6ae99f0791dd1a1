//! Prompt construction for the advice generator and splitting of its reply.

use crate::icons;
use crate::model::AdviceBlock;

/// System instruction sent with every advice request.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful recycling assistant that provides accurate information based on the given context.";

const BLOCK_DELIMITER: &str = "\n\n";

/// Build the user prompt for the identified items and the serialized rules.
#[must_use]
pub fn build_prompt(items: &str, rules_context: &str) -> String {
    format!(
        "You are a recycling assistant\n\
         Using this recycling information:\n\
         {rules_context}\n\
         \n\
         For each item listed: {items}, please tell me:\n\
         1. Which waste type it is using the \"name\" property from the recycling data\n\
         2. Any special preparation needed (if applicable)\n\
         3. Why it goes in that bin or place\n\
         \n\
         Answer each item in its own paragraph and separate paragraphs with a blank line.\n"
    )
}

/// Split generator output into its non-empty paragraphs, in order.
#[must_use]
pub fn split_blocks(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split(BLOCK_DELIMITER)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split generator output and attach the resolved icon to each block.
#[must_use]
pub fn into_blocks(text: &str) -> Vec<AdviceBlock> {
    split_blocks(text)
        .into_iter()
        .map(|block| {
            let icon = icons::resolve(&block);
            AdviceBlock { text: block, icon }
        })
        .collect()
}
