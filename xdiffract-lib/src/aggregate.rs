//! Per-exposure records and their experiment-level, zero-padded stacking.

use indexmap::IndexMap;
use ndarray::{ArrayD, Axis, Dimension, IxDyn, Slice, arr0, arr1};
use num_complex::Complex64;

use crate::error::{DiffractError, Result};

/// A named array output. Scalars are zero-dimensional arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
    Mask(ArrayD<u16>),
    Flag(ArrayD<bool>),
}

impl Value {
    pub fn shape(&self) -> &[usize] {
        match self {
            Value::Real(a) => a.shape(),
            Value::Complex(a) => a.shape(),
            Value::Mask(a) => a.shape(),
            Value::Flag(a) => a.shape(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Real(_) => "real",
            Value::Complex(_) => "complex",
            Value::Mask(_) => "mask",
            Value::Flag(_) => "flag",
        }
    }

    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Real(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ArrayD<Complex64>> {
        match self {
            Value::Complex(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_mask(&self) -> Option<&ArrayD<u16>> {
        match self {
            Value::Mask(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<&ArrayD<bool>> {
        match self {
            Value::Flag(a) => Some(a),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(arr0(v).into_dyn())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Real(arr0(v as f64).into_dyn())
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Real(arr1(&v).into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<f64, D>> for Value {
    fn from(a: ndarray::Array<f64, D>) -> Self {
        Value::Real(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<Complex64, D>> for Value {
    fn from(a: ndarray::Array<Complex64, D>) -> Self {
        Value::Complex(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<u16, D>> for Value {
    fn from(a: ndarray::Array<u16, D>) -> Self {
        Value::Mask(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<bool, D>> for Value {
    fn from(a: ndarray::Array<bool, D>) -> Self {
        Value::Flag(a.into_dyn())
    }
}

/// Named values in insertion order.
pub type Record = IndexMap<String, Value>;

/// Everything one exposure produced.
#[derive(Debug, Clone, Default)]
pub struct Exposure {
    pub source: Record,
    pub sample: Record,
    pub detector: Record,
    /// One record per particle, in illumination order.
    pub particles: Vec<Record>,
    /// Pattern outputs such as `intensity_pattern`.
    pub channels: Record,
}

/// Dense experiment-level arrays. Exposure-level channels have the exposure
/// index as leading axis; particle channels have shape
/// `[exposures, max_particles, ...]` with unused slots left at zero.
#[derive(Debug, Clone, Default)]
pub struct ExperimentAggregate {
    pub source: Record,
    pub sample: Record,
    pub detector: Record,
    pub particles: Record,
    pub channels: Record,
    particle_counts: Vec<usize>,
}

impl ExperimentAggregate {
    pub fn from_exposures(exposures: &[Exposure]) -> Result<Self> {
        let n = exposures.len();
        let particle_counts: Vec<usize> = exposures.iter().map(|e| e.particles.len()).collect();
        let max_k = particle_counts.iter().copied().max().unwrap_or(0);

        let per_exposure = |pick: fn(&Exposure) -> &Record| -> Result<Record> {
            stack_records(
                &[n],
                exposures
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (vec![i], pick(e))),
            )
        };

        let particles = stack_records(
            &[n, max_k],
            exposures.iter().enumerate().flat_map(|(i, e)| {
                e.particles
                    .iter()
                    .enumerate()
                    .map(move |(j, record)| (vec![i, j], record))
            }),
        )?;

        Ok(ExperimentAggregate {
            source: per_exposure(|e| &e.source)?,
            sample: per_exposure(|e| &e.sample)?,
            detector: per_exposure(|e| &e.detector)?,
            particles,
            channels: per_exposure(|e| &e.channels)?,
            particle_counts,
        })
    }

    pub fn number_of_exposures(&self) -> usize {
        self.particle_counts.len()
    }

    /// Real particle count of each exposure; padding slots lie beyond it.
    pub fn particle_counts(&self) -> &[usize] {
        &self.particle_counts
    }

    pub fn max_particles(&self) -> usize {
        self.particle_counts.iter().copied().max().unwrap_or(0)
    }
}

/// Stack the values of every key across records placed at `index` within
/// an output of leading shape `lead`. Keys keep first-seen order; records
/// lacking a key leave zeros in their slot.
fn stack_records<'a, I>(lead: &[usize], records: I) -> Result<Record>
where
    I: IntoIterator<Item = (Vec<usize>, &'a Record)>,
{
    let mut grouped: IndexMap<&'a str, Vec<(Vec<usize>, &'a Value)>> = IndexMap::new();
    for (index, record) in records {
        for (key, value) in record {
            grouped
                .entry(key.as_str())
                .or_default()
                .push((index.clone(), value));
        }
    }
    grouped
        .into_iter()
        .map(|(key, entries)| Ok((key.to_string(), stack_value(key, lead, &entries)?)))
        .collect()
}

macro_rules! collect_variant {
    ($variant:ident, $channel:expr, $entries:expr) => {{
        let mut arrays = Vec::with_capacity($entries.len());
        for (index, value) in $entries {
            match value {
                Value::$variant(a) => arrays.push((index.as_slice(), a)),
                other => {
                    return Err(DiffractError::DataError(format!(
                        "channel '{}' mixes {} and {} values",
                        $channel,
                        $entries[0].1.kind(),
                        other.kind()
                    )))
                }
            }
        }
        arrays
    }};
}

fn stack_value(channel: &str, lead: &[usize], entries: &[(Vec<usize>, &Value)]) -> Result<Value> {
    let Some((_, first)) = entries.first() else {
        return Err(DiffractError::DataError(format!("channel '{channel}' is empty")));
    };
    Ok(match first {
        Value::Real(_) => {
            Value::Real(pad_stack(channel, lead, &collect_variant!(Real, channel, entries))?)
        }
        Value::Complex(_) => {
            Value::Complex(pad_stack(channel, lead, &collect_variant!(Complex, channel, entries))?)
        }
        Value::Mask(_) => {
            Value::Mask(pad_stack(channel, lead, &collect_variant!(Mask, channel, entries))?)
        }
        Value::Flag(_) => {
            Value::Flag(pad_stack(channel, lead, &collect_variant!(Flag, channel, entries))?)
        }
    })
}

/// Place each array at its leading index inside a default-filled output whose
/// trailing shape is the elementwise maximum of the inputs.
fn pad_stack<T: Clone + Default>(
    channel: &str,
    lead: &[usize],
    arrays: &[(&[usize], &ArrayD<T>)],
) -> Result<ArrayD<T>> {
    let rank = arrays.first().map_or(0, |(_, a)| a.ndim());
    let mut trailing = vec![0usize; rank];
    for (_, a) in arrays {
        if a.ndim() != rank {
            return Err(DiffractError::ShapeMismatch {
                channel: channel.to_string(),
                expected: trailing,
                found: a.shape().to_vec(),
            });
        }
        for (t, &s) in trailing.iter_mut().zip(a.shape()) {
            *t = (*t).max(s);
        }
    }

    let full: Vec<usize> = lead.iter().chain(trailing.iter()).copied().collect();
    let mut out = ArrayD::from_elem(IxDyn(&full), T::default());
    for (index, a) in arrays {
        let mut slot = out.view_mut();
        for &i in index.iter() {
            slot = slot.index_axis_move(Axis(0), i);
        }
        slot.slice_each_axis_mut(|ax| Slice::from(0..a.shape()[ax.axis.index()]))
            .assign(*a);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn particle(diameter: f64) -> Record {
        let mut r = Record::new();
        r.insert("diameter".to_string(), Value::from(diameter));
        r
    }

    #[test]
    fn test_particle_channels_are_zero_padded() {
        let exposures: Vec<Exposure> = [1usize, 3, 2]
            .iter()
            .map(|&k| Exposure {
                particles: (0..k).map(|j| particle(1.0 + j as f64)).collect(),
                ..Default::default()
            })
            .collect();
        let agg = ExperimentAggregate::from_exposures(&exposures).unwrap();
        let d = agg.particles["diameter"].as_real().unwrap();
        assert_eq!(d.shape(), &[3, 3]);
        assert_eq!(d[[0, 0]], 1.0);
        assert_eq!(d[[0, 1]], 0.0);
        assert_eq!(d[[0, 2]], 0.0);
        assert_eq!(d[[1, 2]], 3.0);
        assert_eq!(d[[2, 2]], 0.0);
        assert_eq!(agg.particle_counts(), &[1, 3, 2]);
    }

    #[test]
    fn test_trailing_shapes_pad_to_maximum() {
        let mut a = Exposure::default();
        a.channels
            .insert("atoms".to_string(), Value::from(Array1::from(vec![1.0, 2.0])));
        let mut b = Exposure::default();
        b.channels
            .insert("atoms".to_string(), Value::from(Array1::from(vec![5.0, 6.0, 7.0])));
        let agg = ExperimentAggregate::from_exposures(&[a, b]).unwrap();
        let atoms = agg.channels["atoms"].as_real().unwrap();
        assert_eq!(atoms.shape(), &[2, 3]);
        assert_eq!(atoms[[0, 2]], 0.0);
        assert_eq!(atoms[[1, 2]], 7.0);
    }

    #[test]
    fn test_channels_keep_first_seen_order() {
        let mut a = Exposure::default();
        a.channels.insert("zeta".to_string(), Value::from(1.0));
        a.channels.insert("alpha".to_string(), Value::from(2.0));
        let mut b = Exposure::default();
        b.channels.insert("beta".to_string(), Value::from(3.0));
        b.channels.insert("zeta".to_string(), Value::from(4.0));
        let agg = ExperimentAggregate::from_exposures(&[a, b]).unwrap();
        let keys: Vec<&str> = agg.channels.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "beta"]);
        let beta = agg.channels["beta"].as_real().unwrap();
        assert_eq!(beta.as_slice().unwrap(), &[0.0, 3.0]);
    }

    #[test]
    fn test_mixed_kinds_and_ranks_are_rejected() {
        let mut a = Exposure::default();
        a.channels.insert("x".to_string(), Value::from(1.0));
        let mut b = Exposure::default();
        b.channels
            .insert("x".to_string(), Value::from(ndarray::arr1(&[true])));
        assert!(ExperimentAggregate::from_exposures(&[a.clone(), b]).is_err());

        let mut c = Exposure::default();
        c.channels.insert("x".to_string(), Value::from([1.0, 2.0, 3.0]));
        assert!(matches!(
            ExperimentAggregate::from_exposures(&[a, c]),
            Err(DiffractError::ShapeMismatch { .. })
        ));
    }
}
