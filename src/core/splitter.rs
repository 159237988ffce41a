//! # LineSplitter
//!
//! Tokenizes a raw PTY byte stream into terminator-aware lines. Programs
//! running on a PTY mix newline-terminated lines with carriage-return
//! progress overwrites; which terminator ended a line decides whether the
//! pane appends it or replaces its pending tail with it.

/// What ended an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    /// `\n` or `\r\n` (CRLF is collapsed into a single LF line).
    Lf,
    /// A lone `\r`: the line is a transient overwrite of the pending tail.
    Cr,
    /// No terminator. Produced for the final bytes at end-of-stream and for
    /// synthetic lines injected by the executor.
    None,
}

/// Incremental line tokenizer over an unconsumed byte buffer.
#[derive(Default)]
pub(crate) struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the unconsumed buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the next complete line, without its terminator bytes, or
    /// `None` if more input is needed.
    pub fn next_line(&mut self) -> Option<(Vec<u8>, Terminator)> {
        let lf = self.buf.iter().position(|&b| b == b'\n');
        let cr = self.buf.iter().position(|&b| b == b'\r');

        if let Some(cr) = cr {
            match lf {
                // CR with no LF in sight, or an LF further out than the
                // adjacent position: a CR-terminated overwrite line.
                None => return Some(self.take(cr, 1, Terminator::Cr)),
                Some(lf) if lf > cr + 1 => return Some(self.take(cr, 1, Terminator::Cr)),
                // Adjacent CRLF collapses to one LF-terminated line.
                Some(lf) if lf == cr + 1 => return Some(self.take(cr, 2, Terminator::Lf)),
                _ => {}
            }
        }
        lf.map(|lf| self.take(lf, 1, Terminator::Lf))
    }

    /// Flushes the remaining bytes at end-of-stream as a final,
    /// unterminated line.
    pub fn finish(&mut self) -> Option<(Vec<u8>, Terminator)> {
        if self.buf.is_empty() {
            return None;
        }
        Some((std::mem::take(&mut self.buf), Terminator::None))
    }

    fn take(&mut self, end: usize, skip: usize, terminator: Terminator) -> (Vec<u8>, Terminator) {
        let line = self.buf[..end].to_vec();
        self.buf.drain(..end + skip);
        (line, terminator)
    }
}

/// Decodes one tokenized line for display: lossy UTF-8, ANSI CSI/OSC
/// sequences stripped, tabs expanded, other control bytes dropped.
///
/// The grid composes terminal cells itself, so escape sequences from the
/// child cannot be passed through to the host terminal the way a plain
/// pipe would.
pub(crate) fn sanitize_line(bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                // CSI: parameters and intermediates, then one final byte.
                Some('[') => {
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ST (ESC \).
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // Two-byte sequences (charset selection etc.): skip the
                // designator argument as well.
                Some('(') | Some(')') => {
                    chars.next();
                }
                _ => {}
            },
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(inputs: &[&[u8]]) -> Vec<(String, Terminator)> {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();
        for input in inputs {
            splitter.push(input);
            while let Some((bytes, term)) = splitter.next_line() {
                out.push((String::from_utf8(bytes).unwrap(), term));
            }
        }
        if let Some((bytes, term)) = splitter.finish() {
            out.push((String::from_utf8(bytes).unwrap(), term));
        }
        out
    }

    #[test]
    fn lf_terminated_lines() {
        assert_eq!(
            lines(&[b"one\ntwo\n"]),
            vec![
                ("one".into(), Terminator::Lf),
                ("two".into(), Terminator::Lf)
            ]
        );
    }

    #[test]
    fn cr_terminated_line_is_an_overwrite() {
        assert_eq!(
            lines(&[b"50%\r100%\n"]),
            vec![
                ("50%".into(), Terminator::Cr),
                ("100%".into(), Terminator::Lf)
            ]
        );
    }

    #[test]
    fn crlf_collapses_to_lf() {
        assert_eq!(lines(&[b"one\r\n"]), vec![("one".into(), Terminator::Lf)]);
    }

    #[test]
    fn cr_then_distant_lf_emits_cr_line_first() {
        // lf > cr + 1: the CR line stands on its own.
        assert_eq!(
            lines(&[b"a\rbc\n"]),
            vec![("a".into(), Terminator::Cr), ("bc".into(), Terminator::Lf)]
        );
    }

    #[test]
    fn split_across_reads() {
        // The CR overwrite arrives in one read, its replacement in the next.
        assert_eq!(
            lines(&[b"abc\r", b"def\n"]),
            vec![
                ("abc".into(), Terminator::Cr),
                ("def".into(), Terminator::Lf)
            ]
        );
    }

    #[test]
    fn incomplete_line_waits_for_more_bytes() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"partial");
        assert!(splitter.next_line().is_none());
        splitter.push(b" line\n");
        let (bytes, term) = splitter.next_line().unwrap();
        assert_eq!(bytes, b"partial line");
        assert_eq!(term, Terminator::Lf);
    }

    #[test]
    fn eof_flushes_unterminated_tail() {
        assert_eq!(
            lines(&[b"no newline"]),
            vec![("no newline".into(), Terminator::None)]
        );
    }

    #[test]
    fn crlf_split_across_reads() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"one\r");
        // Ambiguous: this could still be the first half of a CRLF. A CR at
        // the end of the buffer is emitted as a CR line anyway; an
        // immediately following LF then arrives as an empty LF line, which
        // clears the pending overwrite, just as a complete CRLF would have
        // left no tail behind.
        let first = splitter.next_line();
        assert_eq!(first, Some((b"one".to_vec(), Terminator::Cr)));
        splitter.push(b"\ntwo\n");
        assert_eq!(splitter.next_line(), Some((Vec::new(), Terminator::Lf)));
        assert_eq!(splitter.next_line(), Some((b"two".to_vec(), Terminator::Lf)));
    }

    #[test]
    fn sanitize_strips_csi_and_osc() {
        assert_eq!(
            sanitize_line(b"\x1b[32mgreen\x1b[0m text"),
            "green text"
        );
        assert_eq!(sanitize_line(b"\x1b]0;title\x07visible"), "visible");
        assert_eq!(sanitize_line(b"a\tb"), "a    b");
        assert_eq!(sanitize_line(b"bell\x07"), "bell");
    }
}
