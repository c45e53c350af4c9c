use std::io::{self, Write};
use std::process;

use clap::{App, Arg};

use zimdump::{DirectoryEntry, Error, MimeType, Zim};

/// Options driving a full dump, parsed once from the command line.
struct DumpOptions {
    show_content: bool,
    whitelist: Vec<String>,
}

fn main() {
    env_logger::init();

    let matches = App::new("zimdump")
        .about("Parse a zimfile and print articles' urls and names on stdout")
        .arg(
            Arg::with_name("mime-types")
                .short("m")
                .help("Print the list of mime-types used in the archive, ignoring other options"),
        )
        .arg(
            Arg::with_name("articles")
                .short("a")
                .help("Also print the content of every whitelisted article"),
        )
        .arg(
            Arg::with_name("types")
                .short("t")
                .takes_value(true)
                .help("Comma separated whitelist of mime-type prefixes shown with -a"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("The zim file to dump")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("URL")
                .help("Print only the content of the entry at this url")
                .index(2),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let zim = match Zim::open(input) {
        Ok(zim) => zim,
        Err(err) => {
            eprintln!("can't parse {}: {}", input, err);
            process::exit(1);
        }
    };

    let result = if matches.is_present("mime-types") {
        dump_mime_types(&zim)
    } else if let Some(url) = matches.value_of("URL") {
        show_article(&zim, url)
    } else {
        let options = DumpOptions {
            show_content: matches.is_present("articles"),
            whitelist: matches
                .value_of("types")
                .unwrap_or("text/html,text/plain")
                .split(',')
                .map(str::to_string)
                .collect(),
        };
        dump_all_articles(&zim, &options)
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn dump_mime_types(zim: &Zim) -> zimdump::Result<()> {
    for mime in &zim.mime_table {
        println!("{}", mime);
    }
    Ok(())
}

fn show_article(zim: &Zim, url: &str) -> zimdump::Result<()> {
    let entry = zim.find_by_url(url)?.ok_or(Error::NotFound)?;
    let content = zim.read_content(&entry)?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    stdout.write_all(&content)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

/// Emits one record per entry, in URL-pointer order:
///
/// ```text
/// <START_OF_ZIM_ARTICLE>
/// url: /foo/bar.html
/// title: Foo Bar
/// mime-type: text/html
/// content:
/// <html>...
/// <END_OF_ZIM_ARTICLE>
/// ```
fn dump_all_articles(zim: &Zim, options: &DumpOptions) -> zimdump::Result<()> {
    for entry in zim.iterate_by_urls()? {
        print_record(zim, &entry, options);
    }
    Ok(())
}

fn print_record(zim: &Zim, entry: &DirectoryEntry, options: &DumpOptions) {
    println!("<START_OF_ZIM_ARTICLE>");
    println!("url: {}", entry.url);
    println!("title: {}", entry.title);

    let mime_type = zim.get_mimetype(entry.mime_id);
    println!("mime-type: {}", mime_type);

    if options.show_content {
        if let MimeType::Type(mime) = &mime_type {
            if is_whitelisted(mime, &options.whitelist) {
                println!("content:");
                match zim.read_content(entry) {
                    Ok(content) => {
                        let stdout = io::stdout();
                        let mut stdout = stdout.lock();
                        stdout.write_all(&content).ok();
                        stdout.write_all(b"\n").ok();
                    }
                    Err(err) => eprintln!("can't read content for {}: {}", entry.url, err),
                }
            } else {
                println!("content:\nNOT-WHITELISTED-MIME-TYPE");
            }
        }
    }

    println!("<END_OF_ZIM_ARTICLE>");
}

/// A mime string is accepted when any whitelist element is a prefix of it,
/// so `text/plain` also matches `text/plain;charset=UTF-8`.
fn is_whitelisted(mime: &str, whitelist: &[String]) -> bool {
    whitelist.iter().any(|prefix| mime.starts_with(prefix.as_str()))
}
