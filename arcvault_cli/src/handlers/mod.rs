pub mod extract;
pub mod list;
pub mod pack;

use std::error::Error;

/// Prompt for the container password when the flag was given.
pub fn maybe_prompt_password(ask: bool) -> Result<Option<String>, Box<dyn Error>> {
    if ask {
        Ok(Some(rpassword::prompt_password("Password: ")?))
    } else {
        Ok(None)
    }
}
