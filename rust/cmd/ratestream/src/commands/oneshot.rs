//! One-shot demo: a short square wave upsampled to split stereo.

use anyhow::Result;
use clap::Args;

use ratestream::{
    ElementType, InputBuffer, IoSpec, OutputBuffer, QualityFlags, QualitySpec, RuntimeSpec,
    oneshot,
};

use super::Quality;

#[derive(Args, Debug)]
pub struct OneshotCommand {
    /// Conversion quality
    #[arg(short, long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,
}

impl OneshotCommand {
    pub fn run(&self) -> Result<()> {
        // 24 stereo frames: a zero left channel and a square wave on the right.
        let input: Vec<f32> = (0..48)
            .map(|i| match i % 4 {
                1 => 1.0,
                3 => -1.0,
                _ => 0.0,
            })
            .collect();
        let mut left = vec![0i32; 48];
        let mut right = vec![0i32; 48];

        let done = oneshot(
            1.0,
            2.0,
            2,
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::planar([&mut left[..], &mut right[..]]),
            IoSpec::validate(ElementType::Float32, ElementType::Int32)?,
            QualitySpec::from_recipe(self.quality.into(), QualityFlags::default())?,
            RuntimeSpec::default(),
        )?;

        for (i, (l, r)) in left.iter().zip(&right).take(done.produced).enumerate() {
            let sep = if (i + 1) % 8 == 0 || i + 1 == done.produced {
                "\n"
            } else {
                " "
            };
            print!(
                "({:5.2}, {:5.2}){sep}",
                f64::from(*l) / f64::from(i32::MAX),
                f64::from(*r) / f64::from(i32::MAX)
            );
        }
        println!("done!");
        Ok(())
    }
}
