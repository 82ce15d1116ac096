use tripmate_core::CoreError;

/// One-line message for the user. Every failed command ends up here.
pub fn notice(err: &anyhow::Error) -> String {
    let Some(core) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) else {
        return format!("Error: {:#}", err);
    };
    let hint = hint(core);
    let has_context = err
        .chain()
        .next()
        .map_or(false, |outer| outer.downcast_ref::<CoreError>().is_none());
    if has_context {
        format!("{}: {}", err, hint)
    } else {
        hint
    }
}

fn hint(err: &CoreError) -> String {
    match err {
        CoreError::Validation(msg) => format!("invalid input, {}", msg),
        CoreError::NotFound(what) => format!("{} does not exist", what),
        CoreError::OutOfRange { requested, max } => {
            format!("position {} is not available, pick 1 to {}", requested, max)
        }
        CoreError::NotConnected => "chat is offline, nothing was sent".to_string(),
        CoreError::Transport(msg) => format!("could not reach the server ({}), try again", msg),
        CoreError::Server { status: 0, message } => format!("chat server refused: {}", message),
        CoreError::Server { status, message } => format!("server answered {}: {}", status, message),
        CoreError::Protocol(msg) => format!("unexpected server response: {}", msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_notice_keeps_context() {
        let result: anyhow::Result<()> = Err(CoreError::OutOfRange { requested: 9, max: 4 })
            .context("Failed to move place 3");
        let notice = notice(&result.unwrap_err());
        assert_eq!(
            notice,
            "Failed to move place 3: position 9 is not available, pick 1 to 4"
        );
    }

    #[test]
    fn test_notice_without_context() {
        let err = anyhow::Error::new(CoreError::NotConnected);
        assert_eq!(notice(&err), "chat is offline, nothing was sent");
    }

    #[test]
    fn test_notice_for_foreign_errors() {
        let err = anyhow::anyhow!("config file missing");
        assert_eq!(notice(&err), "Error: config file missing");
    }
}
