//! Parser for dlib's `shape_predictor` serialization.
//!
//! Integers carry a control byte (high bit is the sign, low nibble the number
//! of little-endian magnitude bytes that follow). Floats are a
//! `(mantissa, exponent)` integer pair. Containers are a length followed by
//! their elements, matrices are `rows, cols` (negated by current dlib
//! versions) followed by row-major values.

use nalgebra::{DVector, Vector2};
use nom::bytes::complete::take;
use nom::combinator::{map, map_res};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::count;
use nom::number::complete::le_u8;
use nom::sequence::tuple;
use nom::IResult;

use super::{RegressionTree, ShapePredictor, SplitFeature};
use crate::error::{Error, Result};

const SUPPORTED_VERSION: i64 = 1;

// https://github.com/davisking/dlib/blob/master/dlib/serialize.h
fn dlib_int(input: &[u8]) -> IResult<&[u8], i64> {
    let (rest, control) = le_u8(input)?;
    let size = (control & 0x0F) as usize;
    if size > 8 {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::TooLarge)));
    }
    let (rest, bytes) = take(size)(rest)?;
    let magnitude = bytes
        .iter()
        .rev()
        .fold(0i64, |acc, &byte| (acc << 8) | i64::from(byte));
    let value = if control & 0x80 != 0 {
        magnitude.wrapping_neg()
    } else {
        magnitude
    };
    Ok((rest, value))
}

fn length(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(dlib_int, usize::try_from)(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/float_details.h
fn dlib_float(input: &[u8]) -> IResult<&[u8], f32> {
    map(tuple((dlib_int, dlib_int)), |(mantissa, exponent)| {
        (mantissa as f64 * 2f64.powi(exponent as i32)) as f32
    })(input)
}

fn vector2(input: &[u8]) -> IResult<&[u8], Vector2<f32>> {
    map(tuple((dlib_float, dlib_float)), |(x, y)| Vector2::new(x, y))(input)
}

/// A length-prefixed container of `element`.
fn sequence<'a, O, F>(mut element: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    move |input| {
        let (input, len) = length(input)?;
        count(&mut element, len)(input)
    }
}

fn matrix_dimensions(input: &[u8]) -> IResult<&[u8], (usize, usize)> {
    map(tuple((dlib_int, dlib_int)), |(rows, cols)| {
        (rows.unsigned_abs() as usize, cols.unsigned_abs() as usize)
    })(input)
}

/// Reads a matrix and keeps it only if it is a single column.
fn column_vector(input: &[u8]) -> IResult<&[u8], DVector<f32>> {
    let (rest, (rows, cols)) = matrix_dimensions(input)?;
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| nom::Err::Error(NomError::new(input, ErrorKind::TooLarge)))?;
    if cols != 1 && len != 0 {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }
    let (rest, values) = count(dlib_float, len)(rest)?;
    Ok((rest, DVector::from_vec(values)))
}

fn split_feature(input: &[u8]) -> IResult<&[u8], SplitFeature> {
    map(tuple((length, length, dlib_float)), |(idx1, idx2, thresh)| {
        SplitFeature { idx1, idx2, thresh }
    })(input)
}

fn regression_tree(input: &[u8]) -> IResult<&[u8], RegressionTree> {
    map(
        tuple((sequence(split_feature), sequence(column_vector))),
        |(splits, leaf_values)| RegressionTree {
            splits,
            leaf_values,
        },
    )(input)
}

fn shape_predictor(input: &[u8]) -> IResult<&[u8], (i64, ShapePredictor)> {
    let (input, version) = dlib_int(input)?;
    let (input, initial_shape) = column_vector(input)?;
    let (input, forests) = sequence(sequence(regression_tree))(input)?;
    let (input, anchor_idx) = sequence(sequence(length))(input)?;
    let (input, deltas) = sequence(sequence(vector2))(input)?;
    Ok((
        input,
        (
            version,
            ShapePredictor {
                initial_shape,
                forests,
                anchor_idx,
                deltas,
            },
        ),
    ))
}

pub fn parse_shape_predictor(bytes: &[u8]) -> Result<ShapePredictor> {
    let (rest, (version, predictor)) = match shape_predictor(bytes) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(error)) | Err(nom::Err::Failure(error)) => {
            return Err(Error::ModelParse {
                offset: bytes.len() - error.input.len(),
                kind: error.code,
            })
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(Error::ModelParse {
                offset: bytes.len(),
                kind: ErrorKind::Eof,
            })
        }
    };

    if version != SUPPORTED_VERSION {
        return Err(Error::InvalidModel(format!(
            "unsupported shape_predictor version {}",
            version
        )));
    }
    if !rest.is_empty() {
        tracing::warn!("{} trailing bytes after shape predictor model", rest.len());
    }

    predictor.validate()?;
    Ok(predictor)
}
