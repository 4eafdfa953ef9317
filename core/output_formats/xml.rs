use super::{RenderContext, RenderedFile};
use crate::error::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;
use std::io::{self, Write};

pub(super) fn render(ctx: &RenderContext) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("export");
    root.push_attribute(("project", ctx.project_name()));
    writer.write_event(Event::Start(root))?;

    write_metadata(ctx, &mut writer)?;
    if ctx.options.include_statistics {
        write_statistics(ctx, &mut writer)?;
    }

    writer.write_event(Event::Start(BytesStart::new("files")))?;
    for file in ctx.files() {
        write_file(file, &mut writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new("files")))?;

    writer.write_event(Event::End(BytesEnd::new("export")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8(bytes)?)
}

fn write_metadata<W: Write>(ctx: &RenderContext, writer: &mut Writer<W>) -> io::Result<()> {
    let m = ctx.metadata;
    writer.write_event(Event::Start(BytesStart::new("metadata")))?;
    write_text_element(writer, "project_name", ctx.project_name())?;
    if let Some(ts) = m.timestamp {
        write_text_element(writer, "timestamp", &ts.to_rfc3339())?;
    }
    if let Some(branch) = &m.git_branch {
        write_text_element(writer, "git_branch", branch)?;
    }
    if let Some(commit) = &m.git_commit {
        write_text_element(writer, "git_commit", commit)?;
    }
    if let Some(author) = &m.git_author {
        write_text_element(writer, "git_author", author)?;
    }
    write_text_element(writer, "files_processed", &m.files_processed.to_string())?;
    write_text_element(writer, "files_skipped", &m.files_skipped.to_string())?;
    write_text_element(writer, "total_bytes", &m.total_bytes.to_string())?;
    write_text_element(writer, "estimated_tokens", &m.estimated_tokens.to_string())?;
    write_text_element(writer, "context_window", m.context_window())?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;
    Ok(())
}

fn write_statistics<W: Write>(ctx: &RenderContext, writer: &mut Writer<W>) -> io::Result<()> {
    let stats = ctx.statistics();
    let mut start = BytesStart::new("statistics");
    start.push_attribute(("total_size", stats.total_size.as_str()));
    writer.write_event(Event::Start(start))?;
    for lang in &stats.languages {
        let mut element = BytesStart::new("language");
        element.push_attribute(("name", lang.language.as_str()));
        element.push_attribute(("files", lang.files.to_string().as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("statistics")))?;
    Ok(())
}

fn write_file<W: Write>(file: &RenderedFile, writer: &mut Writer<W>) -> io::Result<()> {
    let entry = file.entry;
    let mut start = BytesStart::new("file");
    start.push_attribute(("path", xml_safe(&file.path).as_ref()));
    start.push_attribute(("language", entry.language));
    start.push_attribute(("lines", entry.line_count.to_string().as_str()));
    start.push_attribute(("size", entry.byte_size.to_string().as_str()));
    start.push_attribute(("tokens", entry.estimated_tokens.to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    let content = xml_safe(&entry.content);
    for section in cdata_sections(&content) {
        writer.write_event(Event::CData(BytesCData::new(section)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("file")))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Replaces characters XML 1.0 cannot carry, even escaped, with U+FFFD.
fn xml_safe(text: &str) -> Cow<'_, str> {
    let allowed = |c: char| match c {
        '\t' | '\n' | '\r' => true,
        '\u{FFFE}' | '\u{FFFF}' => false,
        c => c >= '\u{20}',
    };
    if text.chars().all(allowed) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if allowed(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

/// Splits content so no section contains `]]>`; readers join adjacent CDATA back together.
fn cdata_sections(content: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = content;
    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

#[cfg(test)]
mod tests {
    use super::super::render as render_any;
    use super::super::tests::{sample_entries, sample_metadata};
    use super::*;
    use crate::config::{ExportOptions, OutputFormat};
    use quick_xml::Reader;

    #[test]
    fn cdata_never_contains_terminator() {
        assert_eq!(cdata_sections("plain"), vec!["plain"]);
        assert_eq!(cdata_sections("a]]>b]]>c"), vec!["a]]", ">b]]", ">c"]);
    }

    #[test]
    fn control_characters_are_replaced() {
        assert!(matches!(xml_safe("tab\tand\r\n"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("\u{1b}[31mred\u{1b}[0m\u{c}"), "\u{FFFD}[31mred\u{FFFD}[0m\u{FFFD}");

        let mut entries = sample_entries();
        entries[0].content = "\u{1b}[31mred\u{1b}[0m\npage\u{c}break\n".to_string();
        let metadata = sample_metadata(&entries);
        let options = ExportOptions {
            output_format: OutputFormat::Xml,
            ..Default::default()
        };
        let xml = render_any(&entries, &options, &metadata).unwrap();
        assert!(!xml.contains('\u{1b}'));
        assert!(!xml.contains('\u{c}'));
        assert!(xml.contains("\u{FFFD}[31mred"));
        let mut reader = Reader::from_str(&xml);
        while !matches!(reader.read_event().unwrap(), Event::Eof) {}
    }

    #[test]
    fn output_is_well_formed_and_round_trips_content() {
        let entries = sample_entries();
        let metadata = sample_metadata(&entries);
        let options = ExportOptions {
            output_format: OutputFormat::Xml,
            ..Default::default()
        };
        let xml = render_any(&entries, &options, &metadata).unwrap();

        let mut reader = Reader::from_str(&xml);
        let mut paths = Vec::new();
        let mut contents: Vec<String> = Vec::new();
        let mut in_file = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"file" => {
                    in_file = true;
                    contents.push(String::new());
                    let path = e
                        .try_get_attribute("path")
                        .unwrap()
                        .unwrap()
                        .unescape_value()
                        .unwrap()
                        .into_owned();
                    paths.push(path);
                }
                Event::End(e) if e.name().as_ref() == b"file" => in_file = false,
                Event::CData(c) if in_file => {
                    let text = std::str::from_utf8(&c.into_inner()).unwrap().to_string();
                    contents.last_mut().unwrap().push_str(&text);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(
            paths,
            vec!["README.md", "scripts/tricky.py", "src/lib.rs", "src/main.rs"]
        );
        assert_eq!(contents[1], "s = ']]>'\nprint(\"\\\"quoted\\\"\\n\")\n");
        assert!(contents[3].contains("<hi> & 'bye'"));
        assert_eq!(xml.matches("path=\"src/main.rs\"").count(), 1);
    }
}
