//! Hardware drivers for the sensors on the I2C bus and GPIO header.
//!
//! Drivers are written against the `embedded-hal` traits; the binaries
//! plug in `linux-embedded-hal` types (`I2cdev`, `CdevPin`, `Delay`).

pub mod aht21;
pub mod mpu6050;
pub mod sound;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use embedded_hal::i2c::Operation;

    /// I2C bus double: records writes, serves scripted read responses.
    #[derive(Default)]
    pub struct ScriptedBus {
        pub writes: Vec<(u8, Vec<u8>)>,
        pub reads: VecDeque<Vec<u8>>,
    }

    impl ScriptedBus {
        pub fn with_reads<const N: usize>(reads: [&[u8]; N]) -> ScriptedBus {
            ScriptedBus {
                writes: Vec::new(),
                reads: reads.iter().map(|r| r.to_vec()).collect(),
            }
        }
    }

    impl embedded_hal::i2c::ErrorType for ScriptedBus {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::i2c::I2c for ScriptedBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        self.writes.push((address, bytes.to_vec()));
                    }
                    Operation::Read(buffer) => {
                        let scripted = self
                            .reads
                            .pop_front()
                            .expect("scripted bus ran out of read responses");
                        assert_eq!(scripted.len(), buffer.len(), "scripted read length");
                        buffer.copy_from_slice(&scripted);
                    }
                }
            }
            Ok(())
        }
    }

    pub struct NoopDelay;

    impl embedded_hal::delay::DelayNs for NoopDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }
}
