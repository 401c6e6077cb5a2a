use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use vidsearch_core::index::domain::span::Span;
use vidsearch_core::shared::timestamp::format_timestamp;

pub const CSV_HEADER: &str = "token|t_start|t_end|hh:mm:ss|conf";

/// Longest slice of the match text used in a clip file name, in characters.
const CLIP_NAME_CHARS: usize = 20;

pub fn write_csv(path: &Path, spans: &[Span]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_rows(&mut out, spans)?;
    out.flush()
}

fn write_rows(out: &mut impl Write, spans: &[Span]) -> io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for span in spans {
        writeln!(
            out,
            "{}|{:.3}|{:.3}|{}|{:.3}",
            csv_field(&span.text),
            span.start_time,
            span.end_time,
            format_timestamp(span.start_time),
            span.confidence
        )?;
    }
    Ok(())
}

/// Quote a field that holds the delimiter, a quote or a line break, doubling
/// any quotes inside it.
fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains(['|', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

/// Output file for the `index`-th clip (1-based).
pub fn clip_file_name(index: usize, text: &str) -> String {
    let slug: String = text.replace(' ', "_").chars().take(CLIP_NAME_CHARS).collect();
    format!("clip_{index:03}_{slug}.mp4")
}

/// An ffmpeg invocation that cuts `span` out of `video` with `margin`
/// seconds on each side, without re-encoding.
pub fn clip_command(index: usize, span: &Span, video: &Path, margin: u32) -> String {
    let margin = f64::from(margin);
    let start = (span.start_time - margin).max(0.0);
    let duration = span.duration() + 2.0 * margin;
    format!(
        "ffmpeg -i {} -ss {start:.3} -t {duration:.3} -c copy {}",
        shell_quote(&video.to_string_lossy()),
        shell_quote(&clip_file_name(index, &span.text))
    )
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn span(text: &str, start: f64, end: f64, confidence: f64) -> Span {
        Span::new(text, start, end, confidence)
    }

    #[test]
    fn test_csv_rows() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[span("buenos dias", 3725.5, 3726.25, 0.87654)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "token|t_start|t_end|hh:mm:ss|conf\n\
             buenos dias|3725.500|3726.250|01:02:05.500|0.877\n"
        );
    }

    #[test]
    fn test_write_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.csv");
        write_csv(&path, &[span("hola", 1.0, 1.5, 0.9), span("hola", 8.0, 8.4, 0.6)]).unwrap();
        let lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[2], "hola|8.000|8.400|00:00:08.000|0.600");
    }

    #[test]
    fn test_csv_text_with_delimiter_is_quoted() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[span("a|b", 1.0, 2.0, 0.5), span("dijo \"si\"", 3.0, 4.0, 0.5)])
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows[0], "\"a|b\"|1.000|2.000|00:00:01.000|0.500");
        assert_eq!(rows[1], "\"dijo \"\"si\"\"\"|3.000|4.000|00:00:03.000|0.500");
    }

    #[rstest]
    #[case(1, "hola", "clip_001_hola.mp4")]
    #[case(12, "buenos dias", "clip_012_buenos_dias.mp4")]
    #[case(3, "que tal estas amigo mio", "clip_003_que_tal_estas_amigo_.mp4")]
    fn test_clip_file_name(#[case] index: usize, #[case] text: &str, #[case] expected: &str) {
        assert_eq!(clip_file_name(index, text), expected);
    }

    #[test]
    fn test_clip_command_applies_margin() {
        let cmd = clip_command(1, &span("hola", 20.0, 21.0, 0.9), Path::new("talk.mp4"), 8);
        assert_eq!(
            cmd,
            "ffmpeg -i 'talk.mp4' -ss 12.000 -t 17.000 -c copy 'clip_001_hola.mp4'"
        );
    }

    #[test]
    fn test_clip_start_clamped_at_zero() {
        let cmd = clip_command(2, &span("si", 3.0, 3.5, 0.9), Path::new("a.mp4"), 8);
        assert!(cmd.contains("-ss 0.000 -t 16.500"));
    }

    #[test]
    fn test_video_path_with_quote_is_escaped() {
        let cmd = clip_command(1, &span("si", 10.0, 11.0, 0.9), Path::new("it's.mp4"), 0);
        assert!(cmd.starts_with(r"ffmpeg -i 'it'\''s.mp4'"));
    }
}
