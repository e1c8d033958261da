//! The `list` built-in.

use crate::error::ShellError;
use crate::session::{ResourceType, Session};

/// Prints the session's resource references of one type, one per line.
///
/// With `values`, only the held references among them are printed.
pub fn handle_list(session: &mut Session, resource: Option<&str>, values: &[String]) -> i32 {
    let Some(kind) = resource.and_then(|r| r.parse::<ResourceType>().ok()) else {
        let usage = ShellError::usage(format!(
            "list [{}] [<value> [<value>]*]",
            ResourceType::enumeration()
        ));
        session.report(&usage);
        return usage.response_code();
    };

    let filter = (!values.is_empty()).then_some(values);
    let listed = session.resources().list(kind, filter).join("\n");
    if listed.is_empty() {
        return 0;
    }
    match session.println(&listed) {
        Ok(()) => 0,
        Err(e) => {
            let e = ShellError::from(e);
            session.report(&e);
            e.response_code()
        }
    }
}
