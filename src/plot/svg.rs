//! SVG chart exports rendered with Plotters.
//!
//! - merit-order curve (price against cumulative volume) with the clearing point
//! - settlement price against demand, with the fitted regression line

use std::path::Path;

use plotters::prelude::*;

use crate::clearing::{ClearingPoint, MeritOrderCurve};
use crate::domain::SettlementRow;
use crate::error::AppError;
use crate::math::LineFit;

const CHART_SIZE: (u32, u32) = (960, 540);

fn plot_error(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::input(format!("Failed to render SVG '{}': {e}", path.display()))
}

/// Finite `[min, max]` of `values`, widened when flat.
fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(min.is_finite() && max.is_finite()) {
        return (0.0, 1.0);
    }
    if max > min {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    } else {
        (min - 1.0, max + 1.0)
    }
}

pub fn write_merit_order_svg(
    path: &Path,
    curve: &MeritOrderCurve,
    clearing: Option<ClearingPoint>,
) -> Result<(), AppError> {
    // Step outline: flat at each offer price, vertical jump to the next offer.
    let mut points = Vec::with_capacity(curve.steps().len() * 2);
    let mut prev_volume = 0.0;
    for step in curve.steps() {
        points.push((prev_volume, step.price));
        points.push((step.cumulative_volume, step.price));
        prev_volume = step.cumulative_volume;
    }

    let x_max = curve.total_volume().max(1.0) * 1.02;
    let (y0, y1) = axis_range(points.iter().map(|p| p.1).chain(clearing.map(|c| c.price)));
    let title = format!("Merit Order for {}", curve.interval_start().format("%Y-%m-%d %H:%M"));

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(path, e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_max, y0..y1)
        .map_err(|e| plot_error(path, e))?;

    chart
        .configure_mesh()
        .x_desc("Cumulative bid volume [MW]")
        .y_desc("Bid price [$/MWh]")
        .draw()
        .map_err(|e| plot_error(path, e))?;

    chart
        .draw_series(LineSeries::new(points, &BLUE))
        .map_err(|e| plot_error(path, e))?
        .label("bid_price")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    if let Some(point) = clearing {
        chart
            .draw_series(std::iter::once(Circle::new((point.demand, point.price), 5, RED.filled())))
            .map_err(|e| plot_error(path, e))?
            .label(format!("clearing {} $/MWh @ {} MW", point.price, point.demand))
            .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| plot_error(path, e))?;

    root.present().map_err(|e| plot_error(path, e))?;
    Ok(())
}

pub fn write_price_demand_svg(path: &Path, rows: &[SettlementRow], fit: Option<&LineFit>) -> Result<(), AppError> {
    let (x0, x1) = axis_range(rows.iter().map(|r| r.demand));
    let (y0, y1) = axis_range(rows.iter().map(|r| r.clearing_price));

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(path, e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Price vs Demand", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| plot_error(path, e))?;

    chart
        .configure_mesh()
        .x_desc("DEMAND (MW)")
        .y_desc("USEP ($/MWh)")
        .draw()
        .map_err(|e| plot_error(path, e))?;

    chart
        .draw_series(
            rows.iter()
                .map(|r| Circle::new((r.demand, r.clearing_price), 2, BLUE.mix(0.5).filled())),
        )
        .map_err(|e| plot_error(path, e))?;

    if let Some(fit) = fit {
        chart
            .draw_series(LineSeries::new([(x0, fit.predict(x0)), (x1, fit.predict(x1))], &RED))
            .map_err(|e| plot_error(path, e))?
            .label(format!("OLS R²={:.3}", fit.r_squared))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| plot_error(path, e))?;
    }

    root.present().map_err(|e| plot_error(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OfferRow;
    use crate::math::fit_line;
    use chrono::NaiveDate;

    #[test]
    fn merit_order_svg_is_written() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let offers = [
            OfferRow { date, period: 1, price: -100.0, volume: 100.0 },
            OfferRow { date, period: 1, price: 50.0, volume: 300.0 },
        ];
        let curve = MeritOrderCurve::build(&offers, date, 1).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.svg");
        write_merit_order_svg(&path, &curve, curve.clearing_point(250.0).ok()).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Merit Order for 2023-01-01 00:00"));
    }

    #[test]
    fn scatter_svg_is_written() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let rows: Vec<SettlementRow> = (1..=10u8)
            .map(|p| SettlementRow {
                information_type: None,
                date,
                period: p,
                clearing_price: 50.0 + f64::from(p),
                load_clearing_price: None,
                demand: 5000.0 + 10.0 * f64::from(p),
                transmission_loss: None,
            })
            .collect();
        let demand: Vec<f64> = rows.iter().map(|r| r.demand).collect();
        let usep: Vec<f64> = rows.iter().map(|r| r.clearing_price).collect();
        let fit = fit_line(&demand, &usep);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scatter.svg");
        write_price_demand_svg(&path, &rows, fit.as_ref()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Price vs Demand"));
    }

    #[test]
    fn flat_axis_is_widened() {
        assert_eq!(axis_range([3.0, 3.0].into_iter()), (2.0, 4.0));
        assert_eq!(axis_range(std::iter::empty::<f64>()), (0.0, 1.0));
    }
}
