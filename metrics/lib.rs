mod mean_variance;

pub use self::mean_variance::*;
