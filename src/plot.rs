//! Waveform figures rendered to SVG.
//!
//! A [`Figure`] is a grid of [`Axes`]. Every axes carries its own title,
//! labels and line series and is drawn into one cell of the grid.

use crate::error::{Error, Result};
use plotters::{
    coord::{ranged1d::ValueFormatter, types::RangedCoordf64, Shift},
    prelude::*,
};
use std::path::Path;
use tracing::debug;

fn plot_error<E: std::fmt::Display>(err: E) -> Error {
    Error::Plot(err.to_string())
}

/// A named line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// One plot inside a figure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Axes {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub grid: bool,
    pub log_x: bool,
    pub ylim: Option<(f64, f64)>,
    pub series: Vec<Series>,
}

impl Axes {
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_xlabel(&mut self, label: &str) -> &mut Self {
        self.xlabel = label.to_string();
        self
    }

    pub fn set_ylabel(&mut self, label: &str) -> &mut Self {
        self.ylabel = label.to_string();
        self
    }

    pub fn grid(&mut self) -> &mut Self {
        self.grid = true;
        self
    }

    pub fn set_xscale_log(&mut self) -> &mut Self {
        self.log_x = true;
        self
    }

    pub fn set_ylim(&mut self, min: f64, max: f64) -> &mut Self {
        self.ylim = Some((min, max));
        self
    }

    pub fn plot<X, Y>(&mut self, label: &str, x: X, y: Y) -> &mut Self
    where
        X: IntoIterator<Item = f64>,
        Y: IntoIterator<Item = f64>,
    {
        self.series.push(Series {
            label: label.to_string(),
            x: x.into_iter().collect(),
            y: y.into_iter().collect(),
        });
        self
    }

    /// X range over all series. Logarithmic axes only consider positive values.
    pub fn x_range(&self) -> (f64, f64) {
        let values = self
            .series
            .iter()
            .flat_map(|s| s.x.iter().copied())
            .filter(|x| x.is_finite() && (!self.log_x || *x > 0.0));
        let (min, max) = bounds(values).unwrap_or(if self.log_x { (1.0, 10.0) } else { (0.0, 1.0) });
        if min < max {
            (min, max)
        } else if self.log_x {
            (min / 10.0, max * 10.0)
        } else {
            (min - 1.0, max + 1.0)
        }
    }

    /// The y-limits when set and usable, otherwise the data range with a margin.
    pub fn y_range(&self) -> (f64, f64) {
        match self.ylim {
            Some((min, max)) if min.is_finite() && max.is_finite() && min < max => return (min, max),
            Some(ylim) => debug!(?ylim, "ignore unusable y-limits"),
            None => {}
        }
        let values = self
            .series
            .iter()
            .flat_map(|s| s.y.iter().copied())
            .filter(|y| y.is_finite());
        match bounds(values) {
            Some((min, max)) if min < max => {
                let margin = (max - min) * 0.05;
                (min - margin, max + margin)
            }
            Some((value, _)) => (value - 1.0, value + 1.0),
            None => (0.0, 1.0),
        }
    }

    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<()> {
        let (x0, x1) = self.x_range();
        let (y0, y1) = self.y_range();
        let mut builder = ChartBuilder::on(area);
        builder
            .caption(&self.title, ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60);
        if self.log_x {
            let mut chart = builder
                .build_cartesian_2d((x0..x1).log_scale(), y0..y1)
                .map_err(plot_error)?;
            self.draw_chart(&mut chart)
        } else {
            let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1).map_err(plot_error)?;
            self.draw_chart(&mut chart)
        }
    }

    fn draw_chart<'a, DB, X>(&self, chart: &mut ChartContext<'a, DB, Cartesian2d<X, RangedCoordf64>>) -> Result<()>
    where
        DB: DrawingBackend + 'a,
        X: Ranged<ValueType = f64> + ValueFormatter<f64>,
    {
        let mut mesh = chart.configure_mesh();
        mesh.x_desc(self.xlabel.as_str()).y_desc(self.ylabel.as_str());
        if !self.grid {
            mesh.disable_x_mesh().disable_y_mesh();
        }
        mesh.draw().map_err(plot_error)?;

        for (index, series) in self.series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            chart
                .draw_series(LineSeries::new(
                    series.x.iter().copied().zip(series.y.iter().copied()),
                    color.stroke_width(2),
                ))
                .map_err(plot_error)?
                .label(series.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
        if !self.series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(plot_error)?;
        }
        Ok(())
    }
}

fn bounds<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}

/// A grid of `rows x cols` axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    rows: usize,
    cols: usize,
    pub size: (u32, u32),
    axes: Vec<Axes>,
}

impl Figure {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            size: (800 * cols as u32, 500 * rows as u32),
            axes: vec![Axes::default(); rows * cols],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn axes(&self) -> &[Axes] {
        &self.axes
    }

    /// Axes in row-major order. Panics when `index` is outside the grid.
    pub fn ax(&mut self, index: usize) -> &mut Axes {
        &mut self.axes[index]
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        let areas = root.split_evenly((self.rows, self.cols));
        for (area, axes) in areas.iter().zip(&self.axes) {
            axes.draw(area)?;
        }
        root.present().map_err(plot_error)?;
        debug!(path = %path.display(), "figure saved");
        Ok(())
    }
}
