use std::io::{self, Write};

use anyhow::Result;

use crate::track::ReportRow;

/// Write the final per-backend traffic summary, one tab-separated line per
/// (backend, port): client, backend:port, connections, resolutions, service.
/// Backends with no known port get a single `:?` line.
pub fn write_summary<W: Write>(out: &mut W, rows: &[ReportRow]) -> Result<()> {
    for row in rows {
        match row.port {
            Some(port) => writeln!(
                out,
                "{}\t{}:{}\t{}\t{}\t{}",
                row.client, row.backend, port, row.connections, row.resolutions, row.service
            )?,
            None => writeln!(
                out,
                "{}\t{}:?\t{}\t{}\t{}",
                row.client, row.backend, row.connections, row.resolutions, row.service
            )?,
        }
    }
    Ok(())
}

pub fn print_summary(rows: &[ReportRow]) -> Result<()> {
    let stdout = io::stdout();
    write_summary(&mut stdout.lock(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn rows_render_with_and_without_ports() {
        let rows = vec![
            ReportRow {
                client: Ipv4Addr::new(10, 0, 0, 1),
                backend: Ipv4Addr::new(10, 0, 0, 9),
                port: Some(443),
                connections: 3,
                resolutions: 2,
                service: "app.internal".to_string(),
            },
            ReportRow {
                client: Ipv4Addr::new(10, 0, 0, 1),
                backend: Ipv4Addr::new(10, 0, 0, 10),
                port: None,
                connections: 0,
                resolutions: 1,
                service: "app.internal".to_string(),
            },
        ];
        let mut out = Vec::new();
        write_summary(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "10.0.0.1\t10.0.0.9:443\t3\t2\tapp.internal\n\
             10.0.0.1\t10.0.0.10:?\t0\t1\tapp.internal\n"
        );
    }
}
