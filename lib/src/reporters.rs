use std::io::Write;

use tabwriter::TabWriter;

use crate::TrendReport;

pub fn report_json(r: &TrendReport, w: &mut dyn Write) -> eyre::Result<()> {
    serde_json::to_writer(&mut *w, r)?;
    w.write_all(b"\n")?;
    Ok(())
}

pub fn report_text(r: &TrendReport, w: &mut dyn Write) -> eyre::Result<()> {
    let mut tw = TabWriter::new(w);
    writeln!(tw, "Product\tPoints\tKept\tMin\tMax\tLatest\tStatus")?;

    for product in &r.products {
        let Some(s) = r.summaries.get(product) else {
            continue;
        };
        let status = s.status.map_or_else(|| "-".to_string(), |st| st.to_string());
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            product, s.points, s.kept, s.min, s.max, s.latest, status
        )?;
    }

    writeln!(
        tw,
        "\nProducts\t[total, max points]\t{}, {}",
        r.meta.total_products, r.meta.max_points_per_product
    )?;

    tw.flush()?;
    Ok(())
}
