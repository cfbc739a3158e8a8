use std::env;

#[derive(Clone, Copy, Debug)]
enum GetOneError {
    Multiple,
}

trait IteratorExt: Iterator {
    fn get_at_most_one(self) -> Result<Option<Self::Item>, GetOneError>;
}

impl<T: Iterator> IteratorExt for T {
    fn get_at_most_one(mut self) -> Result<Option<Self::Item>, GetOneError> {
        match (self.next(), self.next()) {
            (res, None) => Ok(res),
            _ => Err(GetOneError::Multiple),
        }
    }
}

fn main() {
    // Without a device feature `stm32f1` is not pulled in and only the
    // hardware-agnostic modules are compiled, which is how the unit tests run.
    let _chip = match env::vars()
        .map(|(a, _)| a)
        .filter(|x| x.starts_with("CARGO_FEATURE_STM32F1"))
        .get_at_most_one()
    {
        Ok(x) => x,
        Err(GetOneError::Multiple) => panic!("Multiple stm32xx Cargo features enabled"),
    };
}
