mod epoch_agreement;
mod median_determinism;
mod transmit_schedule;
