//! Construction of the Windows command-line string.
//!
//! Windows process creation takes a single string which the child's C runtime
//! re-splits into an argument vector, so the arguments must be encoded such
//! that the split recovers them exactly. The encoding is two independent
//! passes per argument, concatenated with single spaces:
//!
//! 1. [`argv_quote`] - inverts the MSVC runtime's argv parsing rule. Taken
//!    from the canonical description in
//!    <https://learn.microsoft.com/en-us/archive/blogs/twistylittlepassagesallalike/everyone-quotes-command-line-arguments-the-wrong-way>.
//! 2. `escape_metachars` - prefixes `cmd.exe` metacharacters with `^` so the
//!    string survives invocation paths that route through the command
//!    interpreter. This pass runs over the output of the first, never the
//!    reverse.
//!
//! The functions here are pure string transforms with no OS dependency; the
//! module is compiled on every platform so the round-trip law can be tested
//! without a Windows host.

/// Builds the full command line for an argument vector.
///
/// Arguments are quoted and caret-escaped individually and joined with single
/// spaces. An empty vector produces an empty string.
pub fn build_cmdline<S: AsRef<str>>(args: &[S]) -> String {
    let mut cmdline = String::with_capacity(128);
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            cmdline.push(' ');
        }
        let arg_start = cmdline.len();
        argv_quote(&mut cmdline, arg.as_ref());
        escape_metachars(&mut cmdline, arg_start);
    }
    cmdline
}

/// Appends `argument` to `result`, quoted so that the MSVC runtime re-splits
/// it into exactly `argument`.
///
/// A non-empty argument containing no whitespace and no double-quote is
/// appended verbatim. Anything else is wrapped in double quotes; backslash
/// runs are doubled when they precede a quote (with one extra backslash to
/// escape the quote itself) or the end of the argument, and copied unchanged
/// otherwise. An empty argument becomes `""` rather than disappearing.
pub(crate) fn argv_quote(result: &mut String, argument: &str) {
    const NEEDS_QUOTING: &[char] = &[' ', '\t', '\n', '\x0b', '"'];

    if !argument.is_empty() && !argument.contains(NEEDS_QUOTING) {
        result.push_str(argument);
        return;
    }

    result.push('"');
    let mut chars = argument.chars().peekable();
    loop {
        let mut num_backslashes = 0;
        while chars.peek() == Some(&'\\') {
            chars.next();
            num_backslashes += 1;
        }
        match chars.next() {
            None => {
                for _ in 0..num_backslashes * 2 {
                    result.push('\\');
                }
                break;
            }
            Some('"') => {
                for _ in 0..num_backslashes * 2 + 1 {
                    result.push('\\');
                }
                result.push('"');
            }
            Some(c) => {
                for _ in 0..num_backslashes {
                    result.push('\\');
                }
                result.push(c);
            }
        }
    }
    result.push('"');
}

/// Caret-escapes `cmd.exe` metacharacters in `cmdline[start_pos..]`.
///
/// Scans left to right, skipping the index just inserted so a caret is never
/// itself re-escaped. The metacharacters are all ASCII, so the byte scan
/// cannot land inside a multi-byte character.
pub(crate) fn escape_metachars(cmdline: &mut String, start_pos: usize) {
    const METACHARS: &[u8] = b"()%!^\"<>&|";

    let mut i = start_pos;
    while i < cmdline.len() {
        if METACHARS.contains(&cmdline.as_bytes()[i]) {
            cmdline.insert(i, '^');
            i += 1; // skip the caret just inserted
        }
        i += 1;
    }
}
