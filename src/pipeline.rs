use anyhow::{Context, Result};
use tracing::info;

use crate::render::{RenderCounts, Renderer};
use crate::settings::Settings;
use crate::site::SiteData;
use crate::{archive, db, fetch, parse};

pub struct IngestSummary {
    pub rows: usize,
    pub indexed: usize,
    pub archive_bytes: u64,
}

/// Fetch, parse, rebuild the store and write the gzip artifact.
pub fn ingest(settings: &Settings) -> Result<IngestSummary> {
    let text = fetch::fetch_csv(&settings.source_url)?;
    ingest_text(settings, &text)
}

/// Everything after the download. The store is not touched until parsing succeeds.
pub fn ingest_text(settings: &Settings, text: &str) -> Result<IngestSummary> {
    let records = parse::parse_records(text)?;
    info!("Parsed {} rows", records.len());

    info!("Rebuilding store {:?}", settings.db_path);
    let conn = db::connect(&settings.db_path)?;
    let rows = db::rebuild(&conn, &records)?;
    let indexed = db::fts_row_count(&conn)?;
    info!("Inserted {} rows, indexed {}", rows, indexed);
    conn.close()
        .map_err(|(_, e)| e)
        .with_context(|| format!("Failed to close {:?}", settings.db_path))?;

    let archive_bytes = archive::gzip_file(&settings.db_path, &settings.archive_path())?;
    Ok(IngestSummary { rows, indexed, archive_bytes })
}

/// Read the store and write the static site.
pub fn render(settings: &Settings) -> Result<RenderCounts> {
    let renderer = Renderer::new(&settings.templates_dir, &settings.output_dir)?;

    let conn = db::connect_read_only(&settings.db_path)?;
    let stored = db::fetch_all(&conn)?;
    conn.close()
        .map_err(|(_, e)| e)
        .with_context(|| format!("Failed to close {:?}", settings.db_path))?;

    let data = SiteData::build(stored);
    info!(
        "Loaded {} banks across {} states",
        data.banks.len(),
        data.states.len()
    );
    renderer.render_all(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::site::ALL_STATES;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::{Path, PathBuf};
    use std::thread;

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            source_url: "http://localhost/unused.csv".into(),
            db_path: dir.join("data/fdic_failed_banks.db"),
            archive_path: None,
            templates_dir: PathBuf::from("templates"),
            output_dir: dir.join("docs"),
        }
    }

    fn fixture_text() -> String {
        let bytes = fs::read("tests/fixtures/failed_banks.csv").unwrap();
        fetch::decode_body(&bytes).unwrap()
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.insert(path.clone(), fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn ingest_then_render_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());

        let summary = ingest_text(&settings, &fixture_text()).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.indexed, 2);
        assert!(settings.archive_path().is_file());
        assert!(settings.db_path.is_file());

        let conn = db::connect_read_only(&settings.db_path).unwrap();
        let all = db::fetch_all(&conn).unwrap();
        assert_eq!(all[0].record.name, "First National Bank, N.A.");
        assert_eq!(all[0].record.acquiring_institution, "Pioneer Bank, SSB");
        assert_eq!(all[1].record.name, "Café Savings Bank");
        assert_eq!(all[1].record.cert, "05678");
        assert_eq!(db::search(&conn, "pioneer", 5).unwrap().len(), 1);
        drop(conn);

        let counts = render(&settings).unwrap();
        assert_eq!(counts.pages, 3);
        assert_eq!(counts.states, 50);
        assert_eq!(counts.banks, 2);

        let out = &settings.output_dir;
        for page in ["index.html", "all.html", "timeline.html"] {
            assert!(out.join(page).is_file(), "{} missing", page);
        }

        for state in ALL_STATES {
            let path = out.join("states").join(format!("{}.html", state));
            let html = fs::read_to_string(path).unwrap();
            let listed = html.matches(r#"class="bank""#).count();
            match state {
                "TX" | "CA" => assert_eq!(listed, 1, "{}", state),
                _ => {
                    assert_eq!(listed, 0, "{}", state);
                    assert!(html.contains(r#"class="empty""#));
                }
            }
        }
        let tx = fs::read_to_string(out.join("states").join("TX.html")).unwrap();
        assert!(tx.contains("../banks/first-national-bank-n-a.html"));

        let mut bank_files: Vec<_> = fs::read_dir(out.join("banks"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        bank_files.sort();
        assert_eq!(bank_files, vec!["caf-savings-bank.html", "first-national-bank-n-a.html"]);

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains(r#"data-state="TX" data-count="1""#));
        assert!(index.contains(r#"data-state="CA" data-count="1""#));
        assert_eq!(index.matches("data-count=").count(), 2);
        assert!(index.find(">CA</a>").unwrap() < index.find(">TX</a>").unwrap());
    }

    #[test]
    fn rerun_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());

        ingest_text(&settings, &fixture_text()).unwrap();
        render(&settings).unwrap();
        let first = snapshot(&settings.output_dir);

        ingest_text(&settings, &fixture_text()).unwrap();
        render(&settings).unwrap();
        let second = snapshot(&settings.output_dir);

        assert_eq!(first.len(), 55);
        assert_eq!(first, second);
    }

    /// Serve a single request with the given status line and an empty body.
    fn serve_once(status: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/failed_banks.csv", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        (url, handle)
    }

    #[test]
    fn failed_fetch_leaves_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings_in(tmp.path());
        ingest_text(&settings, &fixture_text()).unwrap();

        let (url, server) = serve_once("404 Not Found");
        settings.source_url = url;
        let err = ingest(&settings).err().unwrap();
        server.join().unwrap();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Fetch { status: 404, .. })
        ));
        let conn = db::connect_read_only(&settings.db_path).unwrap();
        assert_eq!(db::row_count(&conn).unwrap(), 2);
        assert_eq!(db::fts_row_count(&conn).unwrap(), 2);
    }

    #[test]
    fn render_without_store_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path());
        let err = render(&settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingStore { .. })
        ));
    }
}
