use miette::SourceSpan;

/// Position relative to start of source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Idx(pub u32);

/// Holds a view into a source.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct Span {
    start: Idx,
    len: u16,
}

impl Span {
    pub fn new(start: Idx, len: u16) -> Self {
        Span { start, len }
    }

    pub fn from_range(start: usize, end: usize) -> Self {
        let len = end.saturating_sub(start).min(u16::MAX as usize) as u16;
        Span::new(Idx(start as u32), len)
    }

    pub fn offs(&self) -> usize {
        self.start.0 as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn end(&self) -> usize {
        self.offs() + self.len()
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.offs()..self.end()
    }

    /// Sub-span of `len` bytes starting `offs` bytes into this span.
    pub fn slice(&self, offs: usize, len: usize) -> Span {
        Span::from_range(self.offs() + offs, self.offs() + offs + len)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

/// One line of source, without its terminator.
#[derive(Clone, Copy, Debug)]
pub struct Line<'a> {
    /// 1-based line number
    pub number: usize,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Line<'a> {
    /// Line content with surrounding whitespace removed, and the span it occupies.
    pub fn trimmed(&self) -> (&'a str, Span) {
        let start = self.text.len() - self.text.trim_start().len();
        let text = self.text.trim();
        (text, self.span.slice(start, text.len()))
    }
}

/// Split source into lines, keeping track of byte offsets.
///
/// Both `\n` and `\r\n` terminators are accepted.
pub fn lines(src: &str) -> impl Iterator<Item = Line<'_>> + '_ {
    let mut offs = 0;
    src.split_inclusive('\n')
        .enumerate()
        .map(move |(i, raw)| {
            let start = offs;
            offs += raw.len();
            let text = raw.trim_end_matches('\n').trim_end_matches('\r');
            Line {
                number: i + 1,
                text,
                span: Span::from_range(start, start + text.len()),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_track_offsets() {
        let src = "ab\r\n  cd \nef";
        let lines: Vec<_> = lines(src).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "ab");
        assert_eq!(lines[1].text, "  cd ");
        assert_eq!(lines[1].span.as_range(), 4..9);
        let (text, span) = lines[1].trimmed();
        assert_eq!(text, "cd");
        assert_eq!(&src[span.as_range()], "cd");
        assert_eq!(lines[2].number, 3);
        assert_eq!(&src[lines[2].span.as_range()], "ef");
    }
}
