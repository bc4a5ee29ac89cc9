use std::ffi::{OsStr, OsString};

use crate::error::{GetoptxError, Result};

const USAGE: &str = r#"Usage: getoptx [OPTION]... SHORTOPTS [ARG]...
Classify ARGs (or the positional parameters) against SHORTOPTS and the long
options given with -l, and print them back as shell words for eval.

  -A ARRAY     Assign the result to array ARRAY.
  -c           Concatenate adjacent numeric short options (-1 -2 => -12).
  -e           Leave error markers (':' and '?') out of the result.
  -E           Abort on the first parse error; the result is empty.
  -l LONGOPTS  Define long options, separated by spaces, commas or pipes.
               A trailing ':' requires an argument, '::' makes it optional.
               May be repeated.
  -n NAME      Name used in error messages.
  -p           Normalise punctuation in long options (--foo-bar => --foobar).
  -q           Suppress error messages (same as a leading ':' in SHORTOPTS).
  -s SCALAR    Assign the result to scalar SCALAR.

Without ARGs, NUL-separated arguments are read from standard input unless
it is a terminal.

Exit status: 0 on success, 1 if parsing failed, 2 on usage errors.
"#;

pub fn usage() -> &'static str {
    USAGE
}

/// Everything the tool's own command line asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub array: Option<String>,
    pub scalar: Option<String>,
    pub name: Option<String>,
    pub long_specs: Vec<String>,
    pub concat_numeric: bool,
    pub elide_errors: bool,
    pub abort_on_error: bool,
    pub normalize_punctuation: bool,
    pub quiet: bool,
    pub short_spec: Option<String>,
    /// `None` when nothing followed the short spec; the host then supplies
    /// the tokens.
    pub operands: Option<Vec<String>>,
}

impl Invocation {
    fn set_value(&mut self, flag: char, value: String) {
        match flag {
            'A' => self.array = Some(value),
            'l' => self.long_specs.push(value),
            'n' => self.name = Some(value),
            's' => self.scalar = Some(value),
            _ => {}
        }
    }
}

/// Non-UTF-8 arguments are refused, never rewritten.
fn utf8(arg: &OsStr) -> Result<String> {
    arg.to_str()
        .map(str::to_string)
        .ok_or_else(|| GetoptxError::NotUtf8(arg.to_string_lossy().into_owned()))
}

/// Parse the tool's own flags into `inv`.
///
/// `inv` is filled in as parsing goes, so after an error it still tells
/// whether `-q` had been seen.
///
/// This is plain POSIX getopt over a fixed flag set, not `reparse::Scanner`:
/// flags end at the first non-flag word (the short spec) with no
/// permutation, and `-` is swallowed as well as `--`.
pub fn parse_into(args: &[OsString], inv: &mut Invocation) -> Result<()> {
    let mut i = 0;

    'args: while let Some(arg) = args.get(i) {
        let arg = utf8(arg)?;
        let Some(flags) = arg.strip_prefix('-') else {
            break;
        };
        i += 1;

        if flags.is_empty() || flags == "-" {
            break;
        }

        for (pos, c) in flags.char_indices() {
            match c {
                'A' | 'l' | 'n' | 's' => {
                    let attached = &flags[pos + c.len_utf8()..];
                    let value = if !attached.is_empty() {
                        attached.to_string()
                    } else {
                        match args.get(i) {
                            Some(v) => {
                                i += 1;
                                utf8(v)?
                            }
                            None => return Err(GetoptxError::OptargExpected(c)),
                        }
                    };
                    inv.set_value(c, value);
                    continue 'args;
                }
                'c' => inv.concat_numeric = true,
                'e' => inv.elide_errors = true,
                'E' => inv.abort_on_error = true,
                'p' => inv.normalize_punctuation = true,
                'q' => inv.quiet = true,
                _ => return Err(GetoptxError::BadOption(flags[pos..].to_string())),
            }
        }
    }

    if let Some(spec) = args.get(i) {
        inv.short_spec = Some(utf8(spec)?);
        let rest = &args[i + 1..];
        if !rest.is_empty() {
            let operands = rest.iter().map(|a| utf8(a)).collect::<Result<Vec<_>>>()?;
            inv.operands = Some(operands);
        }
    }

    log::debug!("invocation: {:?}", inv);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (Result<()>, Invocation) {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let mut inv = Invocation::default();
        let res = parse_into(&args, &mut inv);
        (res, inv)
    }

    #[test]
    fn clustered_flags() {
        let (res, inv) = parse(&["-ceEpq", "ab:", "x"]);
        assert!(res.is_ok());
        assert!(inv.concat_numeric);
        assert!(inv.elide_errors);
        assert!(inv.abort_on_error);
        assert!(inv.normalize_punctuation);
        assert!(inv.quiet);
        assert_eq!(inv.short_spec.as_deref(), Some("ab:"));
        assert_eq!(inv.operands, Some(vec!["x".to_string()]));
    }

    #[test]
    fn value_flags_attached_or_separate() {
        let (res, inv) = parse(&["-Aarr", "-s", "sc", "-nprog", "-l", "foo:", "-lbar", "a"]);
        assert!(res.is_ok());
        assert_eq!(inv.array.as_deref(), Some("arr"));
        assert_eq!(inv.scalar.as_deref(), Some("sc"));
        assert_eq!(inv.name.as_deref(), Some("prog"));
        assert_eq!(inv.long_specs, ["foo:", "bar"]);
        assert_eq!(inv.short_spec.as_deref(), Some("a"));
        assert_eq!(inv.operands, None);
    }

    #[test]
    fn value_flag_ends_its_cluster() {
        let (res, inv) = parse(&["-cAe", "ab"]);
        assert!(res.is_ok());
        assert!(inv.concat_numeric);
        assert_eq!(inv.array.as_deref(), Some("e"));
        assert!(!inv.elide_errors);
    }

    #[test]
    fn dash_and_double_dash_end_flags() {
        let (_, inv) = parse(&["-q", "--", "-ab", "-x"]);
        assert_eq!(inv.short_spec.as_deref(), Some("-ab"));
        assert_eq!(inv.operands, Some(vec!["-x".to_string()]));

        let (_, inv) = parse(&["-", "-ab"]);
        assert_eq!(inv.short_spec.as_deref(), Some("-ab"));
    }

    #[test]
    fn bad_option_reports_rest_of_cluster() {
        let (res, inv) = parse(&["-qxz", "ab"]);
        assert!(matches!(res, Err(GetoptxError::BadOption(ref s)) if s == "xz"));
        assert!(inv.quiet);
    }

    #[test]
    fn missing_flag_value() {
        let (res, _) = parse(&["-c", "-l"]);
        assert!(matches!(res, Err(GetoptxError::OptargExpected('l'))));
    }

    #[test]
    fn no_short_spec() {
        let (res, inv) = parse(&["-c"]);
        assert!(res.is_ok());
        assert_eq!(inv.short_spec, None);
        assert_eq!(inv.operands, None);
    }

    #[test]
    fn non_utf8_is_refused() {
        use std::os::unix::ffi::OsStringExt;

        let mut inv = Invocation::default();
        let args = vec![
            OsString::from("-q"),
            OsString::from("ab:"),
            OsString::from("-a"),
            OsString::from_vec(b"\xffname".to_vec()),
        ];
        let res = parse_into(&args, &mut inv);
        assert!(matches!(res, Err(GetoptxError::NotUtf8(ref s)) if s == "\u{FFFD}name"));
        assert!(inv.quiet);
        assert_eq!(inv.short_spec.as_deref(), Some("ab:"));
        assert_eq!(inv.operands, None);

        let mut inv = Invocation::default();
        let args = vec![OsString::from("-n"), OsString::from_vec(vec![0x80])];
        assert!(matches!(
            parse_into(&args, &mut inv),
            Err(GetoptxError::NotUtf8(_))
        ));
    }
}
