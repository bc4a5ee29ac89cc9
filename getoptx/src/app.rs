use std::ffi::OsString;

use reparse::{LongOptionTable, Policy, Reparsed, ShortOptionSpec};

use crate::arguments::{self, Invocation};
use crate::error::{GetoptxError, Result};
use crate::host::{is_identifier, Host};

pub const TOOL_NAME: &str = "getoptx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    ParseFailed,
    Usage,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::ParseFailed => 1,
            Status::Usage => 2,
        }
    }
}

/// Run one invocation: `args` is the command line without the program name.
pub fn run<H: Host>(host: &mut H, args: &[OsString]) -> Status {
    let mut inv = Invocation::default();

    let (text, mut status) = match classify(host, args, &mut inv) {
        Ok(res) => {
            let status = if res.failed {
                Status::ParseFailed
            } else {
                Status::Success
            };
            (res.text, status)
        }
        Err(e) => {
            inv.quiet |= inv
                .short_spec
                .as_deref()
                .is_some_and(|spec| ShortOptionSpec::parse(spec).is_quiet());
            if !inv.quiet {
                host.warn(&format!("{}: {}", TOOL_NAME, e));
                if matches!(e, GetoptxError::NotEnoughArguments) {
                    host.warn(arguments::usage().trim_end());
                }
            }
            (String::new(), Status::Usage)
        }
    };

    if let Err(e) = deliver(host, &inv, &text) {
        if !inv.quiet {
            host.warn(&format!("{}: {}", TOOL_NAME, e));
        }
        status = Status::Usage;
    }

    log::debug!("finished with {:?}", status);
    status
}

fn classify<H: Host>(host: &mut H, args: &[OsString], inv: &mut Invocation) -> Result<Reparsed> {
    arguments::parse_into(args, inv)?;

    let mut table = LongOptionTable::new();
    for spec in &inv.long_specs {
        table
            .add_spec(spec, inv.normalize_punctuation)
            .map_err(|_| GetoptxError::LongSpec(spec.clone()))?;
    }

    let spec = inv
        .short_spec
        .as_deref()
        .ok_or(GetoptxError::NotEnoughArguments)?;

    let mut short = ShortOptionSpec::parse(spec);
    if inv.quiet {
        short = short.quiet();
    }
    if inv.concat_numeric {
        short = short.with_digits();
    }
    inv.quiet = short.is_quiet();

    let name = inv
        .name
        .clone()
        .or_else(|| host.script_name())
        .unwrap_or_else(|| TOOL_NAME.to_string());

    let tokens = match &inv.operands {
        Some(tokens) => tokens.clone(),
        None => host.positional_params()?,
    };

    let policy = Policy {
        elide_errors: inv.elide_errors,
        abort_on_error: inv.abort_on_error,
        normalize_punctuation: inv.normalize_punctuation,
        concat_numeric: inv.concat_numeric,
    };
    let quiet = inv.quiet;

    Ok(reparse::reparse(&short, &table, &tokens, policy, |fault| {
        if !quiet {
            host.warn(&format!("{}: {}", name, fault));
        }
    }))
}

/// Hand the result to the host. Assignments happen even when `text` is
/// empty; printing does not.
fn deliver<H: Host>(host: &mut H, inv: &Invocation, text: &str) -> Result<()> {
    if let Some(array) = &inv.array {
        if !is_identifier(array) {
            return Err(GetoptxError::NotIdentifier(array.clone()));
        }
        host.eval(&format!("{}=( {} )", array, text))
    } else if let Some(scalar) = &inv.scalar {
        host.assign_scalar(scalar, text)
    } else if !text.is_empty() {
        host.print(text)
    } else {
        Ok(())
    }
}
