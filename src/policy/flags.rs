// src/policy/flags.rs

//! Interpreter flag allowlist and the unbuffered-output check.

use crate::errors::ValidationError;

/// Short flags that only tweak interpreter behaviour.
const SAFE_SHORT_FLAGS: &[char] = &['u', 'O', 'B', 'E', 's', 'S', 'I', 'b', 'q'];

/// Characters that would make the interpreter run something other than the
/// script (`-c CODE`, `-m MODULE`).
const EXECUTION_FLAGS: &[char] = &['c', 'm'];

/// The single flag that takes a separate argument, and its only legal value.
const VALUE_FLAG: &str = "-X";
const VALUE_FLAG_ACCEPTED: &str = "utf8";

const UNBUFFERED_SHORT: char = 'u';
const UNBUFFERED_LONG: &str = "--unbuffered";

/// Flag appended when the configured flags do not already request
/// unbuffered output.
pub const UNBUFFERED_FLAG: &str = "-u";

/// Check every interpreter flag against the allowlist.
pub fn validate_flags<S: AsRef<str>>(flags: &[S]) -> Result<(), ValidationError> {
    let mut iter = flags.iter().map(AsRef::as_ref);

    while let Some(flag) = iter.next() {
        let reject = |reason: &str| ValidationError::Flag {
            flag: flag.to_string(),
            reason: reason.to_string(),
        };

        if flag.starts_with("--") {
            return Err(reject("long-form interpreter flags are not accepted"));
        }
        if flag == "-" || !flag.starts_with('-') {
            return Err(reject(
                "the interpreter command may only contain flags; the script comes from [runner].script",
            ));
        }
        if flag == VALUE_FLAG {
            match iter.next() {
                Some(VALUE_FLAG_ACCEPTED) => continue,
                Some(other) => {
                    return Err(ValidationError::Flag {
                        flag: format!("{VALUE_FLAG} {other}"),
                        reason: format!("only '{VALUE_FLAG} {VALUE_FLAG_ACCEPTED}' is accepted"),
                    });
                }
                None => return Err(reject("missing value")),
            }
        }

        let group = &flag[1..];
        if group.chars().any(|c| EXECUTION_FLAGS.contains(&c)) {
            return Err(reject(
                "flag would run inline code or a module instead of the script",
            ));
        }
        if let Some(bad) = group.chars().find(|c| !SAFE_SHORT_FLAGS.contains(c)) {
            return Err(reject(&format!("unsupported flag character '{bad}'")));
        }
    }

    Ok(())
}

/// Whether the flags already ask for unbuffered output, in short (`-u`),
/// grouped (`-uB`) or long (`--unbuffered`) form.
pub fn requests_unbuffered<S: AsRef<str>>(flags: &[S]) -> bool {
    let mut iter = flags.iter().map(AsRef::as_ref);
    while let Some(flag) = iter.next() {
        if flag == UNBUFFERED_LONG {
            return true;
        }
        if flag == VALUE_FLAG {
            // The value ("utf8") is not a flag group.
            iter.next();
            continue;
        }
        if flag.starts_with('-') && !flag.starts_with("--") && flag[1..].contains(UNBUFFERED_SHORT)
        {
            return true;
        }
    }
    false
}

/// Return the flags with [`UNBUFFERED_FLAG`] appended unless already present.
pub fn with_unbuffered(flags: Vec<String>) -> Vec<String> {
    if requests_unbuffered(&flags) {
        return flags;
    }
    let mut flags = flags;
    flags.push(UNBUFFERED_FLAG.to_string());
    flags
}
